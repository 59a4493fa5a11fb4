//! Geometry primitives for capture coordinates.
//!
//! Two coordinate spaces exist in this crate:
//!
//! - **Page space** (`f64`, CSS pixels): origin at the top-left of the
//!   document, scroll offset already included. All selection rectangles and
//!   crop requests live here. Scroll enters a coordinate exactly once, at the
//!   pointer anchor; nothing downstream may add it again.
//! - **Raster space** (`u32`, device pixels): pixel coordinates of a rendered
//!   frame. Page values convert by multiplying with the capture scale
//!   (device pixel ratio), then clamping into the frame bounds.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Page-space types
// ============================================================================

/// A point in page coordinates (CSS pixels, scroll-inclusive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
}

impl PagePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in page coordinates.
///
/// Stored as left/top/width/height with non-negative extents; construction
/// from arbitrary corner pairs normalizes so `left`/`top` are the minima.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PageRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PageRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Build a normalized rectangle from two opposite corners, in any drag
    /// direction.
    pub fn from_corners(a: PagePoint, b: PagePoint) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Whether both extents reach the given minimum. A drag below this is
    /// treated as "no selection", not an error.
    pub fn meets_min_size(&self, min: f64) -> bool {
        self.width >= min && self.height >= min
    }

    /// Convert to a raster-space crop at the given capture scale.
    ///
    /// Negative page coordinates (possible transiently from synthetic events)
    /// clamp to zero rather than wrapping.
    pub fn to_pixel_crop(&self, scale: f64) -> PixelCrop {
        PixelCrop {
            x: (self.left.max(0.0) * scale).round() as u32,
            y: (self.top.max(0.0) * scale).round() as u32,
            width: (self.width.max(0.0) * scale).round() as u32,
            height: (self.height.max(0.0) * scale).round() as u32,
        }
    }
}

// ============================================================================
// Viewport metrics
// ============================================================================

/// Scroll and viewport measurements reported by the host page at capture time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PageMetrics {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub client_width: f64,
    pub client_height: f64,
    pub inner_width: f64,
    pub inner_height: f64,
    pub device_pixel_ratio: f64,
}

impl PageMetrics {
    /// Effective viewport extents. Browsers disagree on whether scrollbars
    /// count, so the larger of the two measurements wins.
    pub fn viewport_size(&self) -> (f64, f64) {
        (
            self.client_width.max(self.inner_width),
            self.client_height.max(self.inner_height),
        )
    }

    /// The currently visible region of the document, in page coordinates.
    pub fn viewport_rect(&self) -> PageRect {
        let (w, h) = self.viewport_size();
        PageRect::new(self.scroll_x, self.scroll_y, w, h)
    }

    /// Capture scale: configured override, or the page's device pixel
    /// ratio. Fractional values are honored; a ratio the page failed to
    /// report (zero or non-finite) falls back to 1.
    pub fn capture_scale(&self, override_scale: Option<f64>) -> f64 {
        override_scale.unwrap_or_else(|| {
            if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
                self.device_pixel_ratio
            } else {
                1.0
            }
        })
    }
}

// ============================================================================
// Raster-space types
// ============================================================================

/// A crop window in raster (device pixel) coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelCrop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelCrop {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clamp this crop into a frame of the given size.
    ///
    /// The extent shrinks to fit; a crop whose origin lies past the frame
    /// edge (or that ends up empty) returns `None`.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<PixelCrop> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }

        let width = self.width.min(frame_width - self.x);
        let height = self.height.min(frame_height - self.y);

        if width == 0 || height == 0 {
            return None;
        }

        Some(PixelCrop {
            x: self.x,
            y: self.y,
            width,
            height,
        })
    }
}
