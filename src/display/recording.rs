//! Recording driver: collects recorder chunks until something stops it.
//!
//! Exactly one teardown path exists. Manual stop, the duration cap, and
//! the user ending the share from browser UI all funnel into the same
//! tail of the driver task, which removes the cursor highlight and
//! releases the stream through the resource tracker.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{BugsnapError, BugsnapResult};
use crate::host::HostPage;
use crate::media::MIME_WEBM;
use crate::resources::{ResourceTracker, StreamTicket};

use super::RecorderChunks;

// ============================================================================
// Types
// ============================================================================

/// A finished recording.
#[derive(Debug, Clone)]
pub struct RecordedClip {
    pub data: Bytes,
    /// Container MIME reported by the recorder.
    pub mime: String,
    pub duration: Duration,
}

/// Outcome of asking to start a recording.
pub enum RecordingStart {
    Started(RecordingHandle),
    /// The user dismissed the share picker. Not an error.
    Declined,
}

// ============================================================================
// Handle
// ============================================================================

/// Owner's handle to a running recording.
///
/// Dropping the handle detaches the recording; it still stops at the
/// duration cap and tears itself down.
pub struct RecordingHandle {
    driver: JoinHandle<BugsnapResult<RecordedClip>>,
    stop_token: CancellationToken,
    started_at: tokio::time::Instant,
}

impl RecordingHandle {
    pub(crate) fn spawn(
        recorder: Box<dyn RecorderChunks>,
        cap: Duration,
        page: Arc<dyn HostPage>,
        tracker: Arc<ResourceTracker>,
        ticket: StreamTicket,
    ) -> Self {
        let stop_token = CancellationToken::new();
        let driver = tokio::spawn(drive_recording(
            recorder,
            stop_token.clone(),
            cap,
            page,
            tracker,
            ticket,
        ));
        Self {
            driver,
            stop_token,
            started_at: tokio::time::Instant::now(),
        }
    }

    /// How long this recording has been running.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stop the recording and wait for the assembled clip.
    ///
    /// If the recording already ended on its own (duration cap, share
    /// ended), this just collects the result.
    pub async fn stop(self) -> BugsnapResult<RecordedClip> {
        self.stop_token.cancel();
        match self.driver.await {
            Ok(result) => result,
            Err(e) => Err(BugsnapError::RecordingError(format!(
                "recorder task failed: {}",
                e
            ))),
        }
    }

    /// Stop the recording without collecting the clip. Teardown still
    /// runs inside the detached driver task.
    pub fn discard(self) {
        log::debug!("[RECORD] recording discarded");
        self.stop_token.cancel();
    }
}

// ============================================================================
// Driver
// ============================================================================

async fn drive_recording(
    mut recorder: Box<dyn RecorderChunks>,
    stop: CancellationToken,
    cap: Duration,
    page: Arc<dyn HostPage>,
    tracker: Arc<ResourceTracker>,
    ticket: StreamTicket,
) -> BugsnapResult<RecordedClip> {
    let started = tokio::time::Instant::now();
    let cap_timer = tokio::time::sleep(cap);
    tokio::pin!(cap_timer);

    let mut chunks: Vec<Bytes> = Vec::new();
    let mut stop_requested = false;
    loop {
        tokio::select! {
            chunk = recorder.next_chunk() => match chunk {
                Some(data) => {
                    if !data.is_empty() {
                        chunks.push(data);
                    }
                }
                // Recorder fully stopped: flush after request_stop, or the
                // user ended the share from browser UI.
                None => break,
            },
            _ = &mut cap_timer, if !stop_requested => {
                log::debug!("[RECORD] {}s cap reached, stopping recorder", cap.as_secs());
                stop_requested = true;
                recorder.request_stop();
            }
            _ = stop.cancelled(), if !stop_requested => {
                stop_requested = true;
                recorder.request_stop();
            }
        }
    }
    let duration = started.elapsed();

    page.remove_cursor_highlight();
    tracker.release_stream(&ticket);

    let total: usize = chunks.iter().map(Bytes::len).sum();
    if total == 0 {
        log::warn!("[RECORD] recorder produced no data");
        return Err(BugsnapError::RecordingError(
            "recorder produced no data".into(),
        ));
    }
    let mut data = BytesMut::with_capacity(total);
    for chunk in &chunks {
        data.extend_from_slice(chunk);
    }
    let mut mime = recorder.mime_type();
    if mime.is_empty() {
        mime = MIME_WEBM.to_string();
    }
    log::info!(
        "[RECORD] finished: {} bytes of {} in {:.1}s",
        total,
        mime,
        duration.as_secs_f64()
    );
    Ok(RecordedClip {
        data: data.freeze(),
        mime,
        duration,
    })
}
