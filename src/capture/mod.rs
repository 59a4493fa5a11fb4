//! Capture orchestration: mode dispatch, strategy fallbacks, scoped UI
//! hiding.
//!
//! Split into:
//! - `types`: capture modes and outcomes
//! - this module: the orchestrator itself
//!
//! Each mode runs an ordered list of strategies and takes the first
//! raster it gets. The widget's own chrome is hidden before any
//! renderer or display call and restored on every exit path. Failures
//! come back as typed [`CaptureOutcome::Aborted`] values; user
//! cancellations resolve the same way but stay silent.

use std::sync::Arc;

use image::RgbaImage;

use crate::config::WidgetConfig;
use crate::display::recording::RecordedClip;
use crate::display::{DisplayCaptureService, FrameGrab, RecordingHandle, RecordingStart};
use crate::error::BugsnapResult;
use crate::host::HostPage;
use crate::media::{self, CapturedMedia, MIME_PNG};
use crate::preview::PreviewCollection;
use crate::render::{CropSpec, FrameRenderer};
use crate::resources::{OwnedBlobHandle, ResourceTracker};
use crate::selection::{RegionSelector, SelectionOutcome};

pub mod types;

pub use types::{AbortReason, CaptureMode, CaptureOutcome, CaptureRequest};

/// Seek offset for video poster decoding, in seconds.
const POSTER_SEEK_SECS: f64 = 0.1;

// ============================================================================
// Strategy planning
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Strategy {
    Render(CropSpec),
    DisplayFrame,
}

/// Ordered strategy list for a request. Later entries are fallbacks.
fn strategy_plan(request: &CaptureRequest) -> Vec<Strategy> {
    match request.mode {
        CaptureMode::FullPage => vec![Strategy::Render(CropSpec::Full), Strategy::DisplayFrame],
        CaptureMode::VisibleViewport => {
            vec![Strategy::Render(CropSpec::Viewport), Strategy::DisplayFrame]
        }
        CaptureMode::SelectedArea => {
            let crop = request
                .region
                .map(CropSpec::Region)
                .unwrap_or(CropSpec::Viewport);
            // The display fallback cannot honor the crop; a full frame
            // beats nothing.
            vec![Strategy::Render(crop), Strategy::DisplayFrame]
        }
        CaptureMode::Interactive => vec![Strategy::DisplayFrame],
    }
}

enum StrategyRun {
    Image(RgbaImage),
    Cancelled,
    Failed(String),
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs captures end to end and appends results to the preview strip.
pub struct CaptureOrchestrator {
    renderer: FrameRenderer,
    display: DisplayCaptureService,
    selector: RegionSelector,
    page: Arc<dyn HostPage>,
    tracker: Arc<ResourceTracker>,
    previews: Arc<PreviewCollection>,
    config: WidgetConfig,
}

impl CaptureOrchestrator {
    pub fn new(
        renderer: FrameRenderer,
        display: DisplayCaptureService,
        selector: RegionSelector,
        page: Arc<dyn HostPage>,
        tracker: Arc<ResourceTracker>,
        previews: Arc<PreviewCollection>,
        config: WidgetConfig,
    ) -> Self {
        Self {
            renderer,
            display,
            selector,
            page,
            tracker,
            previews,
            config,
        }
    }

    /// Run one still capture to completion.
    ///
    /// For [`CaptureMode::SelectedArea`] the region selector runs first;
    /// a cancelled selection resolves the whole capture without touching
    /// the renderer or the display service.
    pub async fn capture(&self, mode: CaptureMode) -> CaptureOutcome {
        log::debug!("[CAPTURE] {:?} capture requested", mode);
        let region = match mode {
            CaptureMode::SelectedArea => match self.selector.begin_selection().await {
                Ok(SelectionOutcome::Committed(rect)) => Some(rect),
                Ok(SelectionOutcome::Cancelled) => {
                    log::debug!("[CAPTURE] selection cancelled, nothing captured");
                    return CaptureOutcome::cancelled();
                }
                Err(e) => return CaptureOutcome::failed(e.to_string()),
            },
            _ => None,
        };
        let request = CaptureRequest { mode, region };

        let hidden = self.page.hide_widget_ui();
        let run = self.run_strategies(&request).await;
        self.page.restore_widget_ui(hidden);

        match run {
            StrategyRun::Image(image) => self.append_still(image),
            StrategyRun::Cancelled => CaptureOutcome::cancelled(),
            StrategyRun::Failed(message) => {
                log::warn!("[CAPTURE] {:?} capture failed: {}", mode, message);
                CaptureOutcome::failed(message)
            }
        }
    }

    async fn run_strategies(&self, request: &CaptureRequest) -> StrategyRun {
        let mut last_error: Option<String> = None;
        for strategy in strategy_plan(request) {
            match strategy {
                Strategy::Render(crop) => match self.renderer.render_region(crop).await {
                    Ok(image) => return StrategyRun::Image(image),
                    Err(e) => {
                        log::warn!("[CAPTURE] render strategy failed: {}", e);
                        last_error = Some(e.to_string());
                    }
                },
                Strategy::DisplayFrame => match self.display.grab_single_frame().await {
                    Ok(FrameGrab::Frame(image)) => return StrategyRun::Image(image),
                    Ok(FrameGrab::Declined) => return StrategyRun::Cancelled,
                    Ok(FrameGrab::SelfCapture) => {
                        // Reading our own tab back off the stream would
                        // capture feedback; render the DOM instead.
                        match self.renderer.render_region(CropSpec::Full).await {
                            Ok(image) => return StrategyRun::Image(image),
                            Err(e) => {
                                log::warn!("[CAPTURE] self-capture reroute failed: {}", e);
                                last_error = Some(e.to_string());
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("[CAPTURE] display strategy failed: {}", e);
                        last_error = Some(e.to_string());
                    }
                },
            }
        }
        StrategyRun::Failed(
            last_error.unwrap_or_else(|| crate::display::MSG_CAPTURE_FAILED.to_string()),
        )
    }

    fn append_still(&self, image: RgbaImage) -> CaptureOutcome {
        let (width, height) = (image.width(), image.height());
        match media::encode_png(&image) {
            Ok(png) => {
                let blob = self.tracker.track_blob(png, MIME_PNG);
                let number = self.previews.add(CapturedMedia::image(blob));
                log::info!("[CAPTURE] still #{} added ({}x{})", number, width, height);
                CaptureOutcome::Captured { number }
            }
            Err(e) => CaptureOutcome::failed(e.to_string()),
        }
    }

    // ------------------------------------------------------------------
    // Recording path
    // ------------------------------------------------------------------

    /// Start a screen recording. The widget chrome is hidden while the
    /// share picker is up and restored as soon as the recording runs.
    pub async fn start_recording(&self) -> BugsnapResult<RecordingStart> {
        let hidden = self.page.hide_widget_ui();
        let started = self.display.start_recording().await;
        self.page.restore_widget_ui(hidden);
        started
    }

    /// Stop a recording and append the clip (with a poster thumbnail,
    /// when one can be decoded) to the preview strip.
    pub async fn finish_recording(&self, handle: RecordingHandle) -> CaptureOutcome {
        let clip = match handle.stop().await {
            Ok(clip) => clip,
            Err(e) => return CaptureOutcome::failed(e.to_string()),
        };
        let poster = self.decode_poster(&clip).await;
        let duration = clip.duration;
        let blob = self.tracker.track_blob(clip.data, &clip.mime);
        let number = self.previews.add(CapturedMedia::video(blob, poster));
        log::info!(
            "[RECORD] recording #{} added ({:.1}s)",
            number,
            duration.as_secs_f64()
        );
        CaptureOutcome::Captured { number }
    }

    /// Best effort: a recording without a poster is still a recording.
    async fn decode_poster(&self, clip: &RecordedClip) -> Option<OwnedBlobHandle> {
        let frame = match self
            .page
            .decode_video_frame(&clip.data, POSTER_SEEK_SECS)
            .await
        {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("[RECORD] poster decode failed: {}", e);
                return None;
            }
        };
        match media::bounded_poster(&frame, self.config.video_thumb_max_size) {
            Ok(png) => Some(self.tracker.track_blob(png, MIME_PNG)),
            Err(e) => {
                log::warn!("[RECORD] poster encode failed: {}", e);
                None
            }
        }
    }
}
