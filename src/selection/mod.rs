//! Region selection: drag-to-select a page rectangle on an overlay.
//!
//! Split into:
//! - `types`: pointer samples, surface events, the [`SelectionSurface`] trait
//! - `state`: the pure drag state machine
//! - this module: the async driver that runs one interaction end to end
//!
//! The driver guarantees the surface is closed exactly once on every
//! path, including Escape, too-small drags, and the surface vanishing.

use std::sync::Arc;

use crate::error::{BugsnapResult, ResultExt};

mod state;
pub mod types;

pub use state::{DragState, SelectionSession, SessionAction};
pub use types::{
    PointerSample, SelectionEvent, SelectionKey, SelectionOutcome, SelectionSurface, SurfaceError,
    PAINT_THROTTLE_MS,
};

// ============================================================================
// Region selector
// ============================================================================

/// Runs drag-to-select interactions on a [`SelectionSurface`].
pub struct RegionSelector {
    surface: Arc<dyn SelectionSurface>,
    min_selection_px: f64,
}

impl RegionSelector {
    pub fn new(surface: Arc<dyn SelectionSurface>, min_selection_px: f64) -> Self {
        Self {
            surface,
            min_selection_px,
        }
    }

    /// Open the overlay, run one selection to completion, and close the
    /// overlay again.
    ///
    /// Cancellation (Escape, a drag below the minimum size, the pointer
    /// leaving the page) resolves as [`SelectionOutcome::Cancelled`],
    /// not as an error.
    pub async fn begin_selection(&self) -> BugsnapResult<SelectionOutcome> {
        if let Err(e) = self.surface.open().await {
            self.surface.close();
            return Err(e).context("selection overlay failed to open");
        }

        let mut session = SelectionSession::new(self.min_selection_px, PAINT_THROTTLE_MS);
        let outcome = loop {
            let Some(event) = self.surface.next_event().await else {
                // Event source ran dry without a terminal event.
                break SelectionOutcome::Cancelled;
            };
            match session.on_event(event) {
                SessionAction::None => {}
                SessionAction::Paint(rect) => self.surface.paint_box(rect),
                SessionAction::Resolve(outcome) => break outcome,
            }
        };
        self.surface.close();

        match &outcome {
            SelectionOutcome::Committed(rect) => {
                log::debug!(
                    "[SELECT] committed {}x{} at ({}, {})",
                    rect.width,
                    rect.height,
                    rect.left,
                    rect.top
                );
            }
            SelectionOutcome::Cancelled => log::debug!("[SELECT] cancelled"),
        }
        Ok(outcome)
    }
}
