//! Embeddable bug-report capture core.
//!
//! Everything a bug-report widget needs between "the user hit a capture
//! button" and "the report landed on the server", with the page chrome
//! itself left to the embedding host:
//!
//! - Still captures of the full page, the visible viewport, a drag-selected
//!   region, or whatever the user picks in the browser share dialog
//! - Screen recordings with a hard duration cap and a poster thumbnail
//! - A bounded preview strip with 1-based, always-contiguous numbering
//! - Blob-URL and stream bookkeeping so repeated captures never leak
//! - Multipart report upload with streamed progress and a console log rider
//!
//! Host integration happens through four traits ([`host::HostPage`],
//! [`display::DisplayMedia`], [`render::RenderEngine`],
//! [`selection::SelectionSurface`]); [`widget::BugReportWidget`] wires them
//! to the pipeline.

pub mod capture;
pub mod config;
pub mod diagnostics;
pub mod display;
pub mod error;
pub mod geometry;
pub mod hotkeys;
pub mod host;
pub mod media;
pub mod preview;
pub mod render;
pub mod report;
pub mod resources;
pub mod selection;
pub mod widget;

// Facade and configuration
pub use config::{WidgetConfig, WidgetOptions};
pub use widget::{BugReportWidget, WidgetHosts};

// Capture pipeline
pub use capture::{AbortReason, CaptureMode, CaptureOrchestrator, CaptureOutcome};
pub use display::{DisplayCaptureService, RecordedClip, RecordingHandle, RecordingStart};
pub use render::{CropSpec, FrameRenderer};
pub use selection::{RegionSelector, SelectionOutcome};

// Host contract
pub use display::{DisplayMedia, DisplayStream, RecorderChunks, StreamGrant};
pub use host::{HiddenUi, HostPage, StylePatch};
pub use render::RenderEngine;
pub use selection::SelectionSurface;

// Previews, resources, reports
pub use error::{BugsnapError, BugsnapResult};
pub use media::{CapturedMedia, MediaKind};
pub use preview::{PreviewCollection, PreviewItemInfo};
pub use report::{ReportUploader, UploadProgress, UploadResponse};
pub use resources::{OwnedBlobHandle, ResourceTracker};
