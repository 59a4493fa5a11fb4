//! Display-media capture: single frames from a shared screen, and the
//! screen recording driver.
//!
//! Split into:
//! - this module: the stream traits, frame grabbing and black-frame policy
//! - `recording`: the chunk-collecting recording driver and its handle
//!
//! Screen sharing always goes through the host's picker. The user choosing
//! "cancel" there is an outcome, not an error; hard failures and streams
//! that never produce a usable frame are errors with actionable messages.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::config::WidgetConfig;
use crate::error::{BugsnapError, BugsnapResult};
use crate::host::HostPage;
use crate::media;
use crate::resources::ResourceTracker;

pub mod recording;
#[cfg(test)]
mod tests;

pub use recording::{RecordedClip, RecordingHandle, RecordingStart};

// ============================================================================
// Messages
// ============================================================================

/// Shown when a granted stream never becomes decodable.
pub const MSG_STREAM_TIMEOUT: &str = "Timed out waiting for the screen stream to become playable";

/// Shown when every grabbed frame stays black. Tab shares are the usual
/// culprit; pointing at the picker beats a bare failure.
pub const MSG_TAB_GUIDANCE: &str = "Unable to capture the selected display (no valid frame). \
     Try picking 'Window' or 'Entire screen' instead of 'Tab' in the share dialog.";

/// Generic failure for a capture that produced nothing.
pub const MSG_CAPTURE_FAILED: &str = "Screen capture cancelled or failed";

// ============================================================================
// Stream types
// ============================================================================

/// What kind of surface the user picked in the share dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DisplaySurface {
    /// A browser tab. Capturing our own tab this way yields feedback
    /// artifacts, so it gets rerouted to the DOM renderer.
    Browser,
    Window,
    Monitor,
}

/// Settings reported by a granted stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSettings {
    /// `None` when the platform does not report a surface kind.
    pub display_surface: Option<DisplaySurface>,
}

/// What to ask the picker for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub video: bool,
    pub audio: bool,
}

#[derive(Debug, Error)]
pub enum DisplayMediaError {
    /// Acquiring or reading the stream failed outright.
    #[error("{0}")]
    Failed(String),
    /// The platform recorder could not be constructed or broke mid-run.
    #[error("recorder error: {0}")]
    Recorder(String),
}

/// Outcome of asking the user to share a display.
pub enum StreamGrant {
    Granted(Box<dyn DisplayStream>),
    /// The user dismissed the picker. Not an error.
    Declined,
}

/// Access to the host's screen-share picker.
#[async_trait::async_trait]
pub trait DisplayMedia: Send + Sync {
    async fn request_stream(
        &self,
        constraints: StreamConstraints,
    ) -> Result<StreamGrant, DisplayMediaError>;
}

/// One granted display stream.
#[async_trait::async_trait]
pub trait DisplayStream: Send + Sync {
    fn settings(&self) -> StreamSettings;

    /// Resolves once the stream has decodable video. The service bounds
    /// this with its own timeout; implementations may pend forever.
    async fn wait_playable(&self);

    /// Decode the current video frame.
    async fn grab_frame(&self) -> Result<RgbaImage, DisplayMediaError>;

    /// Attach a platform recorder producing containerized chunks.
    fn start_recorder(&self) -> Result<Box<dyn RecorderChunks>, DisplayMediaError>;

    /// Stop all tracks. Must be idempotent; only the resource tracker
    /// calls this.
    fn stop(&self);
}

/// Chunk source of an attached recorder.
#[async_trait::async_trait]
pub trait RecorderChunks: Send {
    /// Next encoded chunk, or `None` once the recorder has fully stopped
    /// (including the flush after [`request_stop`]). Must be cancel-safe:
    /// dropping the future must not lose a chunk.
    ///
    /// [`request_stop`]: RecorderChunks::request_stop
    async fn next_chunk(&mut self) -> Option<bytes::Bytes>;

    /// Ask the recorder to stop and flush. Chunks keep arriving until
    /// `next_chunk` returns `None`.
    fn request_stop(&self);

    /// Container MIME of the produced chunks, e.g. `video/webm;codecs=vp9`.
    fn mime_type(&self) -> String;
}

// ============================================================================
// Frame grabbing
// ============================================================================

/// Result of a single-frame grab.
#[derive(Debug)]
pub enum FrameGrab {
    Frame(RgbaImage),
    /// The user shared this very tab; the caller should render the DOM
    /// instead of reading the stream back.
    SelfCapture,
    /// The user dismissed the share picker.
    Declined,
}

/// Grabs stills and starts recordings on shared displays.
pub struct DisplayCaptureService {
    media: Arc<dyn DisplayMedia>,
    page: Arc<dyn HostPage>,
    tracker: Arc<ResourceTracker>,
    config: WidgetConfig,
}

impl DisplayCaptureService {
    pub fn new(
        media: Arc<dyn DisplayMedia>,
        page: Arc<dyn HostPage>,
        tracker: Arc<ResourceTracker>,
        config: WidgetConfig,
    ) -> Self {
        Self {
            media,
            page,
            tracker,
            config,
        }
    }

    /// Ask the user to share a display and grab one good frame from it.
    ///
    /// The stream's tracks are stopped before this returns, on every
    /// path. A frame counts as good once its probe pixel is not black;
    /// black frames are retried on the configured delay ladder.
    pub async fn grab_single_frame(&self) -> BugsnapResult<FrameGrab> {
        let grant = self
            .media
            .request_stream(StreamConstraints {
                video: true,
                audio: false,
            })
            .await
            .map_err(|e| {
                log::warn!("[CAPTURE] display request failed: {}", e);
                BugsnapError::StreamUnusable(MSG_CAPTURE_FAILED.into())
            })?;
        let stream: Arc<dyn DisplayStream> = match grant {
            StreamGrant::Declined => {
                log::debug!("[CAPTURE] share picker dismissed");
                return Ok(FrameGrab::Declined);
            }
            StreamGrant::Granted(stream) => Arc::from(stream),
        };

        let ticket = {
            let stream = Arc::clone(&stream);
            self.tracker.register_stream(move || stream.stop())
        };
        let result = self.frame_from_stream(stream.as_ref()).await;
        self.tracker.release_stream(&ticket);
        result
    }

    async fn frame_from_stream(&self, stream: &dyn DisplayStream) -> BugsnapResult<FrameGrab> {
        if stream.settings().display_surface == Some(DisplaySurface::Browser) {
            log::debug!("[CAPTURE] share target is this tab, rerouting to the DOM renderer");
            return Ok(FrameGrab::SelfCapture);
        }

        let playable_timeout = Duration::from_millis(self.config.stream_playable_timeout_ms);
        tokio::time::timeout(playable_timeout, stream.wait_playable())
            .await
            .map_err(|_| BugsnapError::StreamUnusable(MSG_STREAM_TIMEOUT.into()))?;
        tokio::time::sleep(Duration::from_millis(self.config.stream_stabilize_delay_ms)).await;

        let mut frame = self.grab(stream).await?;
        if !media::looks_black(&frame, self.config.black_frame_threshold) {
            return Ok(FrameGrab::Frame(frame));
        }

        for delay_ms in &self.config.black_frame_retry_delays_ms {
            log::debug!("[CAPTURE] black frame, retrying in {}ms", delay_ms);
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            frame = self.grab(stream).await?;
            if !media::looks_black(&frame, self.config.black_frame_threshold) {
                return Ok(FrameGrab::Frame(frame));
            }
        }

        log::warn!("[CAPTURE] stream produced only black frames");
        Err(BugsnapError::StreamUnusable(MSG_TAB_GUIDANCE.into()))
    }

    async fn grab(&self, stream: &dyn DisplayStream) -> BugsnapResult<RgbaImage> {
        stream
            .grab_frame()
            .await
            .map_err(|e| BugsnapError::StreamUnusable(e.to_string()))
    }

    /// Ask the user to share a display and start recording it.
    ///
    /// On success the stream's stop action is registered with the resource
    /// tracker and the cursor highlight is shown; both are undone by the
    /// recording teardown, whether it stops manually, at the duration cap,
    /// or because the user ended the share from browser UI.
    pub async fn start_recording(&self) -> BugsnapResult<RecordingStart> {
        let grant = self
            .media
            .request_stream(StreamConstraints {
                video: true,
                audio: true,
            })
            .await
            .map_err(|e| BugsnapError::RecordingError(e.to_string()))?;
        let stream: Arc<dyn DisplayStream> = match grant {
            StreamGrant::Declined => {
                log::debug!("[RECORD] share picker dismissed");
                return Ok(RecordingStart::Declined);
            }
            StreamGrant::Granted(stream) => Arc::from(stream),
        };

        let recorder = match stream.start_recorder() {
            Ok(recorder) => recorder,
            Err(e) => {
                stream.stop();
                return Err(BugsnapError::RecordingError(e.to_string()));
            }
        };
        let ticket = {
            let stream = Arc::clone(&stream);
            self.tracker.register_stream(move || stream.stop())
        };

        self.page.show_cursor_highlight();
        let cap = Duration::from_secs(self.config.max_record_secs);
        let handle = RecordingHandle::spawn(
            recorder,
            cap,
            Arc::clone(&self.page),
            Arc::clone(&self.tracker),
            ticket,
        );
        log::info!("[RECORD] recording started (cap {}s)", cap.as_secs());
        Ok(RecordingStart::Started(handle))
    }
}
