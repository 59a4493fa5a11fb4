//! Pure state machine for a drag-to-select interaction.
//!
//! The session consumes [`SelectionEvent`]s and tells the driver what to
//! do next (repaint the box, or resolve the selection). It owns no I/O,
//! which keeps the drag rules unit-testable without an overlay.

use std::time::Instant;

use crate::geometry::{PagePoint, PageRect};

use super::types::{PointerSample, SelectionEvent, SelectionKey, SelectionOutcome};

// ============================================================================
// Drag state
// ============================================================================

/// Anchor and current pointer position of an in-progress drag, both in
/// page coordinates.
#[derive(Debug, Clone, Copy)]
pub struct DragState {
    pub anchor: PagePoint,
    pub current: PagePoint,
}

impl DragState {
    pub fn begin(anchor: PagePoint) -> Self {
        Self {
            anchor,
            current: anchor,
        }
    }

    /// The normalized selection rect for the current drag. Dragging in
    /// any direction yields the same rect.
    pub fn selection_rect(&self) -> PageRect {
        PageRect::from_corners(self.anchor, self.current)
    }
}

// ============================================================================
// Session
// ============================================================================

/// What the driver must do after feeding an event to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Nothing to do (event ignored or repaint throttled).
    None,
    /// Repaint the selection box at this rect.
    Paint(PageRect),
    /// The interaction is over; tear down the overlay.
    Resolve(SelectionOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Dragging,
}

/// One selection interaction from overlay mount to resolution.
#[derive(Debug)]
pub struct SelectionSession {
    min_selection_px: f64,
    paint_throttle_ms: u64,
    phase: Phase,
    drag: Option<DragState>,
    last_paint: Option<Instant>,
}

impl SelectionSession {
    pub fn new(min_selection_px: f64, paint_throttle_ms: u64) -> Self {
        Self {
            min_selection_px,
            paint_throttle_ms,
            phase: Phase::Idle,
            drag: None,
            last_paint: None,
        }
    }

    /// Feed one surface event and get the action the driver must take.
    pub fn on_event(&mut self, event: SelectionEvent) -> SessionAction {
        match event {
            SelectionEvent::PointerDown(sample) => self.on_pointer_down(sample),
            SelectionEvent::PointerMove(sample) => self.on_pointer_move(sample),
            SelectionEvent::PointerUp(sample) => self.on_pointer_up(sample),
            SelectionEvent::KeyDown(SelectionKey::Escape) => {
                SessionAction::Resolve(SelectionOutcome::Cancelled)
            }
            SelectionEvent::KeyDown(SelectionKey::Other) => SessionAction::None,
            SelectionEvent::PointerLeft | SelectionEvent::SurfaceClosed => {
                SessionAction::Resolve(SelectionOutcome::Cancelled)
            }
        }
    }

    fn on_pointer_down(&mut self, sample: PointerSample) -> SessionAction {
        if self.phase == Phase::Dragging {
            // Secondary button mid-drag; keep the existing anchor.
            return SessionAction::None;
        }
        let drag = DragState::begin(sample.page_point());
        let rect = drag.selection_rect();
        self.drag = Some(drag);
        self.phase = Phase::Dragging;
        self.mark_painted();
        SessionAction::Paint(rect)
    }

    fn on_pointer_move(&mut self, sample: PointerSample) -> SessionAction {
        let Some(drag) = self.drag.as_mut() else {
            return SessionAction::None;
        };
        drag.current = sample.page_point();
        let rect = drag.selection_rect();
        if self.should_paint() {
            self.mark_painted();
            SessionAction::Paint(rect)
        } else {
            SessionAction::None
        }
    }

    fn on_pointer_up(&mut self, sample: PointerSample) -> SessionAction {
        let Some(drag) = self.drag.as_mut() else {
            return SessionAction::None;
        };
        drag.current = sample.page_point();
        let rect = drag.selection_rect();
        let outcome = if rect.meets_min_size(self.min_selection_px) {
            SelectionOutcome::Committed(rect)
        } else {
            SelectionOutcome::Cancelled
        };
        SessionAction::Resolve(outcome)
    }

    /// True once enough time has passed since the last repaint.
    fn should_paint(&self) -> bool {
        match self.last_paint {
            None => true,
            Some(at) => at.elapsed().as_millis() >= u128::from(self.paint_throttle_ms),
        }
    }

    fn mark_painted(&mut self) {
        self.last_paint = Some(Instant::now());
    }
}
