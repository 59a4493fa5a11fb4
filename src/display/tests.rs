//! Unit tests for display capture and recording.
//!
//! Tests are organized by concern:
//! - Single-frame grabs (black-frame retries, timeouts, self-capture)
//! - The recording driver (manual stop, duration cap, upstream end)
//!
//! Timing-sensitive tests run on a paused tokio clock, so the retry
//! ladder and the 10s cap elapse instantly and deterministically.

#[cfg(test)]
mod support {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use image::{Rgba, RgbaImage};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::display::*;
    use crate::geometry::PageMetrics;
    use crate::host::{HiddenUi, HostPage, HostPageError, StylePatch};

    pub fn black_frame() -> RgbaImage {
        RgbaImage::new(64, 48)
    }

    pub fn lit_frame() -> RgbaImage {
        RgbaImage::from_pixel(64, 48, Rgba([120, 130, 140, 255]))
    }

    // ------------------------------------------------------------------
    // Host page fake
    // ------------------------------------------------------------------

    #[derive(Default)]
    pub struct FakePage {
        pub cursor_shown: AtomicUsize,
        pub cursor_removed: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl HostPage for FakePage {
        fn metrics(&self) -> PageMetrics {
            PageMetrics::default()
        }

        fn page_url(&self) -> String {
            "https://example.test/".into()
        }

        fn hide_widget_ui(&self) -> HiddenUi {
            HiddenUi::default()
        }

        fn restore_widget_ui(&self, _hidden: HiddenUi) {}

        fn neutralize_incompatible_colors(&self) -> StylePatch {
            StylePatch::default()
        }

        fn restore_styles(&self, _patch: StylePatch) {}

        fn show_cursor_highlight(&self) {
            self.cursor_shown.fetch_add(1, Ordering::SeqCst);
        }

        fn remove_cursor_highlight(&self) {
            self.cursor_removed.fetch_add(1, Ordering::SeqCst);
        }

        async fn decode_video_frame(
            &self,
            _video: &Bytes,
            _seek_secs: f64,
        ) -> Result<RgbaImage, HostPageError> {
            Err(HostPageError::VideoDecode("not supported in tests".into()))
        }
    }

    // ------------------------------------------------------------------
    // Stream fakes
    // ------------------------------------------------------------------

    /// Observation point the test keeps after the stream is handed over.
    #[derive(Default)]
    pub struct StreamProbe {
        pub stopped: AtomicBool,
        pub grab_calls: AtomicUsize,
    }

    /// How a scripted stream's recorder behaves.
    pub enum RecorderPlan {
        /// Emit a chunk every `interval` until stopped, then one tail chunk.
        Steady { interval: Duration },
        /// Emit `chunks` chunks, then end on its own (share ended upstream).
        EndsAfter { chunks: usize, interval: Duration },
        /// Emit nothing, end only when stopped.
        Empty,
    }

    pub struct FakeStream {
        pub settings: StreamSettings,
        pub playable: bool,
        pub frames: Mutex<VecDeque<RgbaImage>>,
        pub recorder_plan: Mutex<Option<RecorderPlan>>,
        pub probe: Arc<StreamProbe>,
    }

    impl FakeStream {
        pub fn with_frames(frames: Vec<RgbaImage>) -> (Box<Self>, Arc<StreamProbe>) {
            let probe = Arc::new(StreamProbe::default());
            let stream = Box::new(Self {
                settings: StreamSettings {
                    display_surface: Some(DisplaySurface::Monitor),
                },
                playable: true,
                frames: Mutex::new(frames.into()),
                recorder_plan: Mutex::new(None),
                probe: Arc::clone(&probe),
            });
            (stream, probe)
        }

        pub fn recording(plan: RecorderPlan) -> (Box<Self>, Arc<StreamProbe>) {
            let (stream, probe) = Self::with_frames(Vec::new());
            *stream.recorder_plan.lock() = Some(plan);
            (stream, probe)
        }
    }

    #[async_trait::async_trait]
    impl DisplayStream for FakeStream {
        fn settings(&self) -> StreamSettings {
            self.settings
        }

        async fn wait_playable(&self) {
            if !self.playable {
                std::future::pending::<()>().await;
            }
        }

        async fn grab_frame(&self) -> Result<RgbaImage, DisplayMediaError> {
            self.probe.grab_calls.fetch_add(1, Ordering::SeqCst);
            self.frames
                .lock()
                .pop_front()
                .ok_or_else(|| DisplayMediaError::Failed("no scripted frame".into()))
        }

        fn start_recorder(&self) -> Result<Box<dyn RecorderChunks>, DisplayMediaError> {
            let plan = self
                .recorder_plan
                .lock()
                .take()
                .ok_or_else(|| DisplayMediaError::Recorder("no recorder scripted".into()))?;
            let (tx, rx) = mpsc::unbounded_channel();
            let stop = CancellationToken::new();
            tokio::spawn(feed_chunks(plan, tx, stop.clone()));
            Ok(Box::new(FakeRecorder { rx, stop }))
        }

        fn stop(&self) {
            self.probe.stopped.store(true, Ordering::SeqCst);
        }
    }

    async fn feed_chunks(
        plan: RecorderPlan,
        tx: mpsc::UnboundedSender<Bytes>,
        stop: CancellationToken,
    ) {
        match plan {
            RecorderPlan::Steady { interval } => {
                let mut n = 0u8;
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {
                            let _ = tx.send(Bytes::from(vec![n; 64]));
                            n = n.wrapping_add(1);
                        }
                    }
                }
                let _ = tx.send(Bytes::from_static(b"tail"));
            }
            RecorderPlan::EndsAfter { chunks, interval } => {
                for n in 0..chunks {
                    tokio::time::sleep(interval).await;
                    let _ = tx.send(Bytes::from(vec![n as u8; 64]));
                }
            }
            RecorderPlan::Empty => {
                stop.cancelled().await;
            }
        }
    }

    pub struct FakeRecorder {
        rx: mpsc::UnboundedReceiver<Bytes>,
        stop: CancellationToken,
    }

    #[async_trait::async_trait]
    impl RecorderChunks for FakeRecorder {
        async fn next_chunk(&mut self) -> Option<Bytes> {
            self.rx.recv().await
        }

        fn request_stop(&self) {
            self.stop.cancel();
        }

        fn mime_type(&self) -> String {
            "video/webm;codecs=vp9".into()
        }
    }

    // ------------------------------------------------------------------
    // Media fake
    // ------------------------------------------------------------------

    pub struct FakeDisplayMedia {
        grants: Mutex<VecDeque<StreamGrant>>,
        pub requests: Mutex<Vec<StreamConstraints>>,
    }

    impl FakeDisplayMedia {
        pub fn granting(grants: Vec<StreamGrant>) -> Arc<Self> {
            Arc::new(Self {
                grants: Mutex::new(grants.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl DisplayMedia for FakeDisplayMedia {
        async fn request_stream(
            &self,
            constraints: StreamConstraints,
        ) -> Result<StreamGrant, DisplayMediaError> {
            self.requests.lock().push(constraints);
            self.grants
                .lock()
                .pop_front()
                .ok_or_else(|| DisplayMediaError::Failed("no scripted grant".into()))
        }
    }
}

#[cfg(test)]
mod frame_tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::support::*;
    use crate::config::WidgetConfig;
    use crate::display::*;
    use crate::error::BugsnapError;
    use crate::resources::ResourceTracker;

    fn service(
        media: Arc<FakeDisplayMedia>,
        page: Arc<FakePage>,
        tracker: Arc<ResourceTracker>,
    ) -> DisplayCaptureService {
        let _ = env_logger::builder().is_test(true).try_init();
        DisplayCaptureService::new(media, page, tracker, WidgetConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn first_good_frame_is_returned_and_stream_stopped() {
        let (stream, probe) = FakeStream::with_frames(vec![lit_frame()]);
        let media = FakeDisplayMedia::granting(vec![StreamGrant::Granted(stream)]);
        let tracker = Arc::new(ResourceTracker::new());
        let svc = service(media.clone(), Arc::new(FakePage::default()), tracker.clone());

        let grab = svc.grab_single_frame().await.unwrap();
        assert!(matches!(grab, FrameGrab::Frame(_)));
        assert_eq!(probe.grab_calls.load(Ordering::SeqCst), 1);
        assert!(probe.stopped.load(Ordering::SeqCst));
        assert_eq!(tracker.live_count(), 0);
        // Stills ask for video only.
        assert_eq!(
            media.requests.lock()[0],
            StreamConstraints {
                video: true,
                audio: false
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn black_frames_are_retried_until_lit() {
        let (stream, probe) =
            FakeStream::with_frames(vec![black_frame(), black_frame(), lit_frame()]);
        let media = FakeDisplayMedia::granting(vec![StreamGrant::Granted(stream)]);
        let svc = service(
            media,
            Arc::new(FakePage::default()),
            Arc::new(ResourceTracker::new()),
        );

        let grab = svc.grab_single_frame().await.unwrap();
        assert!(matches!(grab, FrameGrab::Frame(_)));
        assert_eq!(probe.grab_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_black_frames_fail_with_guidance() {
        let frames = vec![black_frame(), black_frame(), black_frame(), black_frame()];
        let (stream, probe) = FakeStream::with_frames(frames);
        let media = FakeDisplayMedia::granting(vec![StreamGrant::Granted(stream)]);
        let tracker = Arc::new(ResourceTracker::new());
        let svc = service(media, Arc::new(FakePage::default()), tracker.clone());

        let err = svc.grab_single_frame().await.unwrap_err();
        match err {
            BugsnapError::StreamUnusable(message) => {
                assert!(message.contains("Entire screen"));
            }
            other => panic!("expected unusable stream, got {:?}", other),
        }
        // Initial grab plus one per retry delay.
        assert_eq!(probe.grab_calls.load(Ordering::SeqCst), 4);
        assert!(probe.stopped.load(Ordering::SeqCst));
        assert_eq!(tracker.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn never_playable_stream_times_out() {
        let (mut stream, probe) = FakeStream::with_frames(vec![lit_frame()]);
        stream.playable = false;
        let media = FakeDisplayMedia::granting(vec![StreamGrant::Granted(stream)]);
        let svc = service(
            media,
            Arc::new(FakePage::default()),
            Arc::new(ResourceTracker::new()),
        );

        let err = svc.grab_single_frame().await.unwrap_err();
        assert!(matches!(err, BugsnapError::StreamUnusable(_)));
        assert_eq!(probe.grab_calls.load(Ordering::SeqCst), 0);
        assert!(probe.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn tab_self_capture_is_rerouted_not_grabbed() {
        let (mut stream, probe) = FakeStream::with_frames(vec![lit_frame()]);
        stream.settings = StreamSettings {
            display_surface: Some(DisplaySurface::Browser),
        };
        let media = FakeDisplayMedia::granting(vec![StreamGrant::Granted(stream)]);
        let svc = service(
            media,
            Arc::new(FakePage::default()),
            Arc::new(ResourceTracker::new()),
        );

        let grab = svc.grab_single_frame().await.unwrap();
        assert!(matches!(grab, FrameGrab::SelfCapture));
        assert_eq!(probe.grab_calls.load(Ordering::SeqCst), 0);
        assert!(probe.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn dismissed_picker_is_an_outcome_not_an_error() {
        let media = FakeDisplayMedia::granting(vec![StreamGrant::Declined]);
        let svc = service(
            media,
            Arc::new(FakePage::default()),
            Arc::new(ResourceTracker::new()),
        );

        let grab = svc.grab_single_frame().await.unwrap();
        assert!(matches!(grab, FrameGrab::Declined));
    }
}

#[cfg(test)]
mod recording_tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use super::support::*;
    use crate::config::WidgetConfig;
    use crate::display::*;
    use crate::error::BugsnapError;
    use crate::resources::ResourceTracker;

    struct Recording {
        handle: RecordingHandle,
        page: Arc<FakePage>,
        probe: Arc<StreamProbe>,
        tracker: Arc<ResourceTracker>,
    }

    async fn start(plan: RecorderPlan) -> Recording {
        let _ = env_logger::builder().is_test(true).try_init();
        let (stream, probe) = FakeStream::recording(plan);
        let media = FakeDisplayMedia::granting(vec![StreamGrant::Granted(stream)]);
        let page = Arc::new(FakePage::default());
        let tracker = Arc::new(ResourceTracker::new());
        let svc =
            DisplayCaptureService::new(media, page.clone(), tracker.clone(), WidgetConfig::default());
        match svc.start_recording().await.unwrap() {
            RecordingStart::Started(handle) => Recording {
                handle,
                page,
                probe,
                tracker,
            },
            RecordingStart::Declined => panic!("expected recording to start"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn manual_stop_assembles_clip_and_tears_down() {
        let rec = start(RecorderPlan::Steady {
            interval: Duration::from_millis(500),
        })
        .await;
        assert_eq!(rec.page.cursor_shown.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(2200)).await;
        let clip = rec.handle.stop().await.unwrap();

        assert!(!clip.data.is_empty());
        assert_eq!(clip.mime, "video/webm;codecs=vp9");
        assert!(clip.duration >= Duration::from_millis(2200));
        assert!(clip.duration < Duration::from_secs(3));
        assert_eq!(rec.page.cursor_removed.load(Ordering::SeqCst), 1);
        assert!(rec.probe.stopped.load(Ordering::SeqCst));
        assert_eq!(rec.tracker.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duration_cap_stops_the_recording_by_itself() {
        let rec = start(RecorderPlan::Steady {
            interval: Duration::from_millis(500),
        })
        .await;

        // Well past the 10s cap without any manual stop.
        tokio::time::sleep(Duration::from_secs(12)).await;
        let clip = rec.handle.stop().await.unwrap();

        assert!(clip.duration >= Duration::from_secs(10));
        assert!(clip.duration < Duration::from_secs(11));
        assert_eq!(rec.page.cursor_removed.load(Ordering::SeqCst), 1);
        assert!(rec.probe.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_share_end_finishes_the_recording() {
        let rec = start(RecorderPlan::EndsAfter {
            chunks: 2,
            interval: Duration::from_millis(400),
        })
        .await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        let clip = rec.handle.stop().await.unwrap();

        assert_eq!(clip.data.len(), 2 * 64);
        assert_eq!(rec.page.cursor_removed.load(Ordering::SeqCst), 1);
        assert!(rec.probe.stopped.load(Ordering::SeqCst));
        assert_eq!(rec.tracker.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_recording_is_an_error_but_still_tears_down() {
        let rec = start(RecorderPlan::Empty).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        let err = rec.handle.stop().await.unwrap_err();

        assert!(matches!(err, BugsnapError::RecordingError(_)));
        assert_eq!(rec.page.cursor_removed.load(Ordering::SeqCst), 1);
        assert!(rec.probe.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn declined_picker_does_not_start_anything() {
        let media = FakeDisplayMedia::granting(vec![StreamGrant::Declined]);
        let page = Arc::new(FakePage::default());
        let svc = DisplayCaptureService::new(
            media,
            page.clone(),
            Arc::new(ResourceTracker::new()),
            WidgetConfig::default(),
        );

        let start = svc.start_recording().await.unwrap();
        assert!(matches!(start, RecordingStart::Declined));
        assert_eq!(page.cursor_shown.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recordings_request_audio() {
        let (stream, _probe) = FakeStream::recording(RecorderPlan::Steady {
            interval: Duration::from_millis(500),
        });
        let media = FakeDisplayMedia::granting(vec![StreamGrant::Granted(stream)]);
        let svc = DisplayCaptureService::new(
            media.clone(),
            Arc::new(FakePage::default()),
            Arc::new(ResourceTracker::new()),
            WidgetConfig::default(),
        );

        let started = svc.start_recording().await.unwrap();
        assert_eq!(
            media.requests.lock()[0],
            StreamConstraints {
                video: true,
                audio: true
            }
        );
        if let RecordingStart::Started(handle) = started {
            handle.discard();
        }
    }
}
