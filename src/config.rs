//! Widget configuration.
//!
//! Consolidates every tunable of the capture pipeline into a single typed
//! struct with documented defaults. Hosts pass loosely-filled overrides
//! (`WidgetOptions`); merging is a pure function so it can be tested without
//! mounting anything.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Preview capacity when none is configured.
pub const DEFAULT_MAX_PREVIEWS: usize = 6;

/// Drags narrower or shorter than this many CSS pixels count as "no selection".
pub const DEFAULT_MIN_SELECTION_PX: f64 = 6.0;

/// Hard recording cap in seconds.
pub const DEFAULT_MAX_RECORD_SECS: u64 = 10;

/// Summed-RGB intensity below which a sampled pixel counts as black.
pub const DEFAULT_BLACK_FRAME_THRESHOLD: u32 = 10;

/// Backoff schedule for re-grabbing a frame that came back black.
pub const DEFAULT_BLACK_FRAME_RETRY_DELAYS_MS: [u64; 3] = [300, 500, 800];

/// Bounded wait for a display stream to become playable.
pub const DEFAULT_STREAM_PLAYABLE_TIMEOUT_MS: u64 = 4000;

/// Settle delay between playability and the first frame grab.
pub const DEFAULT_STREAM_STABILIZE_DELAY_MS: u64 = 300;

/// Report image thumbnails are downscaled to at most this width.
pub const DEFAULT_IMAGE_THUMB_MAX_WIDTH: u32 = 320;

/// Video poster thumbnails are bounded to this width and height.
pub const DEFAULT_VIDEO_THUMB_MAX_SIZE: (u32, u32) = (320, 180);

/// Centralized widget configuration.
///
/// One instance is owned by the widget facade; components receive it by
/// reference or as copied fields at construction. There is no global.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WidgetConfig {
    /// Preview capacity; adding beyond it evicts (and revokes) the oldest item.
    pub max_previews: usize,

    /// Minimum selection extent in CSS pixels; below it a drag is abandoned
    /// silently rather than captured or errored.
    pub min_selection_px: f64,

    /// Hard cap on recording duration in seconds. Auto-stop at this point
    /// runs the same teardown as a manual stop.
    pub max_record_secs: u64,

    /// Summed-RGB threshold for the black-frame probe.
    pub black_frame_threshold: u32,

    /// Delays between black-frame re-grab attempts, in milliseconds.
    pub black_frame_retry_delays_ms: Vec<u64>,

    /// How long to wait for a granted stream to become playable (ms).
    pub stream_playable_timeout_ms: u64,

    /// Settle delay after playability before grabbing a frame (ms).
    pub stream_stabilize_delay_ms: u64,

    /// Capture scale override. `None` uses the page's device pixel ratio.
    pub render_scale: Option<f64>,

    /// Width cap for report image thumbnails.
    pub image_thumb_max_width: u32,

    /// Bounds for video poster thumbnails (width, height).
    pub video_thumb_max_size: (u32, u32),

    /// Report upload endpoint. Empty means the host never calls submit.
    pub endpoint: String,

    /// Whether the built-in hotkey bindings are active.
    pub hotkeys: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            max_previews: DEFAULT_MAX_PREVIEWS,
            min_selection_px: DEFAULT_MIN_SELECTION_PX,
            max_record_secs: DEFAULT_MAX_RECORD_SECS,
            black_frame_threshold: DEFAULT_BLACK_FRAME_THRESHOLD,
            black_frame_retry_delays_ms: DEFAULT_BLACK_FRAME_RETRY_DELAYS_MS.to_vec(),
            stream_playable_timeout_ms: DEFAULT_STREAM_PLAYABLE_TIMEOUT_MS,
            stream_stabilize_delay_ms: DEFAULT_STREAM_STABILIZE_DELAY_MS,
            render_scale: None,
            image_thumb_max_width: DEFAULT_IMAGE_THUMB_MAX_WIDTH,
            video_thumb_max_size: DEFAULT_VIDEO_THUMB_MAX_SIZE,
            endpoint: String::new(),
            hotkeys: true,
        }
    }
}

impl WidgetConfig {
    /// Apply host overrides. Present fields win, absent fields keep the base
    /// value. Pure function; validation happens separately.
    pub fn with_overrides(mut self, options: WidgetOptions) -> Self {
        if let Some(v) = options.max_previews {
            self.max_previews = v;
        }
        if let Some(v) = options.min_selection_px {
            self.min_selection_px = v;
        }
        if let Some(v) = options.max_record_secs {
            self.max_record_secs = v;
        }
        if let Some(v) = options.black_frame_threshold {
            self.black_frame_threshold = v;
        }
        if let Some(v) = options.black_frame_retry_delays_ms {
            self.black_frame_retry_delays_ms = v;
        }
        if let Some(v) = options.stream_playable_timeout_ms {
            self.stream_playable_timeout_ms = v;
        }
        if let Some(v) = options.stream_stabilize_delay_ms {
            self.stream_stabilize_delay_ms = v;
        }
        if let Some(v) = options.render_scale {
            self.render_scale = Some(v);
        }
        if let Some(v) = options.image_thumb_max_width {
            self.image_thumb_max_width = v;
        }
        if let Some(v) = options.video_thumb_max_size {
            self.video_thumb_max_size = v;
        }
        if let Some(v) = options.endpoint {
            self.endpoint = v;
        }
        if let Some(v) = options.hotkeys {
            self.hotkeys = v;
        }
        self
    }

    /// Validate and clamp settings to acceptable ranges.
    pub fn validate(&mut self) {
        self.max_previews = self.max_previews.clamp(1, 24);
        self.min_selection_px = self.min_selection_px.clamp(1.0, 64.0);
        self.max_record_secs = self.max_record_secs.clamp(1, 300);
        self.black_frame_threshold = self.black_frame_threshold.min(765);
        if self.black_frame_retry_delays_ms.is_empty() {
            self.black_frame_retry_delays_ms = DEFAULT_BLACK_FRAME_RETRY_DELAYS_MS.to_vec();
        }
        self.stream_playable_timeout_ms = self.stream_playable_timeout_ms.clamp(250, 30_000);
        self.image_thumb_max_width = self.image_thumb_max_width.clamp(16, 4096);
        if let Some(scale) = self.render_scale {
            if !scale.is_finite() || scale <= 0.0 {
                self.render_scale = None;
            }
        }
        log::debug!("[CONFIG] validated: {:?}", self);
    }

    /// Merge + validate in one step, the path hosts actually use.
    pub fn resolved(options: WidgetOptions) -> Self {
        let mut config = Self::default().with_overrides(options);
        config.validate();
        config
    }
}

/// Host-supplied overrides. Every field optional; unknown JSON keys are
/// ignored so older embed snippets keep working.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct WidgetOptions {
    pub max_previews: Option<usize>,
    pub min_selection_px: Option<f64>,
    pub max_record_secs: Option<u64>,
    pub black_frame_threshold: Option<u32>,
    pub black_frame_retry_delays_ms: Option<Vec<u64>>,
    pub stream_playable_timeout_ms: Option<u64>,
    pub stream_stabilize_delay_ms: Option<u64>,
    pub render_scale: Option<f64>,
    pub image_thumb_max_width: Option<u32>,
    pub video_thumb_max_size: Option<(u32, u32)>,
    pub endpoint: Option<String>,
    pub hotkeys: Option<bool>,
}
