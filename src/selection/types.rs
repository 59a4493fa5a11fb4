//! Types shared across the region selection module.
//!
//! Pointer samples arrive in client (viewport) coordinates together with
//! the scroll offsets that were current when the event fired. Converting
//! to page coordinates happens exactly once, at the sample itself, so a
//! page that scrolls mid-drag cannot shift the anchor.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::geometry::{PagePoint, PageRect};

// ============================================================================
// Constants
// ============================================================================

/// Minimum interval between overlay repaints while dragging (~1 frame).
pub const PAINT_THROTTLE_MS: u64 = 16;

// ============================================================================
// Pointer samples and events
// ============================================================================

/// One pointer reading from the selection surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PointerSample {
    pub client_x: f64,
    pub client_y: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl PointerSample {
    pub fn new(client_x: f64, client_y: f64, scroll_x: f64, scroll_y: f64) -> Self {
        Self {
            client_x,
            client_y,
            scroll_x,
            scroll_y,
        }
    }

    /// Page-coordinate position of this sample (client + scroll).
    pub fn page_point(&self) -> PagePoint {
        PagePoint::new(self.client_x + self.scroll_x, self.client_y + self.scroll_y)
    }
}

/// Key presses the selection surface reports. Anything that is not
/// Escape is forwarded as `Other` and ignored by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum SelectionKey {
    Escape,
    Other,
}

/// Events emitted by a [`SelectionSurface`] while a selection is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export)]
pub enum SelectionEvent {
    PointerDown(PointerSample),
    PointerMove(PointerSample),
    PointerUp(PointerSample),
    KeyDown(SelectionKey),
    /// Pointer left the document entirely.
    PointerLeft,
    /// The surface was torn down underneath us (e.g. host page navigated).
    SurfaceClosed,
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of one selection interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// The user committed a region at least the minimum size, in page
    /// coordinates and already normalized.
    Committed(PageRect),
    /// Escape, a too-small drag, pointer leaving the page, or the
    /// surface closing. Never an error.
    Cancelled,
}

// ============================================================================
// Surface trait
// ============================================================================

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("selection overlay failed to mount: {0}")]
    Mount(String),
}

/// A full-page overlay that captures pointer input and draws the
/// selection box. Implemented by the embedding host (DOM overlay in a
/// browser, test double in unit tests).
#[async_trait::async_trait]
pub trait SelectionSurface: Send + Sync {
    /// Mount the overlay and start delivering events.
    async fn open(&self) -> Result<(), SurfaceError>;

    /// Next pointer/key event, or `None` once the surface is gone.
    async fn next_event(&self) -> Option<SelectionEvent>;

    /// Draw the selection box at the given page-coordinate rect.
    fn paint_box(&self, rect: PageRect);

    /// Remove the overlay and the selection box. Must be idempotent.
    fn close(&self);
}
