//! Capture modes and outcomes.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::geometry::PageRect;

// ============================================================================
// Modes
// ============================================================================

/// The four still-capture modes. Recording is a separate path, not a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum CaptureMode {
    /// Render the whole document.
    FullPage,
    /// Render the document, cropped to the visible viewport.
    VisibleViewport,
    /// Drag-to-select a region first, then render it.
    SelectedArea,
    /// Go straight to the screen-share picker.
    Interactive,
}

/// One capture invocation, after any selection has resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    pub mode: CaptureMode,
    /// Committed selection for [`CaptureMode::SelectedArea`], else `None`.
    pub region: Option<PageRect>,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a capture ended without a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[ts(export)]
pub enum AbortReason {
    /// The user backed out (Escape, tiny drag, dismissed share picker).
    /// Callers should stay silent about these.
    Cancelled,
    /// Every strategy failed. The message is user-presentable.
    Failed { message: String },
}

/// Terminal result of a capture or recording finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "camelCase")]
#[ts(export)]
pub enum CaptureOutcome {
    /// A preview was appended at this 1-based number.
    Captured { number: usize },
    Aborted { reason: AbortReason },
}

impl CaptureOutcome {
    pub fn cancelled() -> Self {
        Self::Aborted {
            reason: AbortReason::Cancelled,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Aborted {
            reason: AbortReason::Failed {
                message: message.into(),
            },
        }
    }
}
