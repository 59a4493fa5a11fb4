//! Widget facade.
//!
//! [`BugReportWidget`] is the one object an embedding host constructs. It
//! owns the configuration, the resource tracker, the preview strip, the
//! diagnostics buffer and the capture orchestrator, and exposes the small
//! surface the host chrome calls into: run a capture, start/stop a
//! recording, manage previews, submit the report, tear down.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::capture::{CaptureMode, CaptureOrchestrator, CaptureOutcome};
use crate::config::{WidgetConfig, WidgetOptions};
use crate::diagnostics::ConsoleBuffer;
use crate::display::{DisplayCaptureService, DisplayMedia, RecordingHandle, RecordingStart};
use crate::error::{BugsnapError, BugsnapResult};
use crate::hotkeys::{HotkeyMap, KeyPress};
use crate::host::HostPage;
use crate::preview::{PreviewCollection, PreviewItemInfo};
use crate::render::{FrameRenderer, RenderEngine};
use crate::report::{
    gather_report_fields, ProgressCallback, ReportDraft, ReportUploader, UploadResponse,
};
use crate::resources::ResourceTracker;
use crate::selection::{RegionSelector, SelectionSurface};

/// The host-side collaborators a widget is built on.
pub struct WidgetHosts {
    pub page: Arc<dyn HostPage>,
    pub media: Arc<dyn DisplayMedia>,
    pub engine: Arc<dyn RenderEngine>,
    pub selection: Arc<dyn SelectionSurface>,
}

/// Embeddable bug-report capture core.
pub struct BugReportWidget {
    config: WidgetConfig,
    page: Arc<dyn HostPage>,
    tracker: Arc<ResourceTracker>,
    previews: Arc<PreviewCollection>,
    diagnostics: Arc<ConsoleBuffer>,
    orchestrator: CaptureOrchestrator,
    uploader: ReportUploader,
    hotkeys: HotkeyMap,
    recording: Mutex<Option<RecordingHandle>>,
}

impl BugReportWidget {
    pub fn new(options: WidgetOptions, hosts: WidgetHosts) -> Self {
        let config = WidgetConfig::resolved(options);
        let tracker = Arc::new(ResourceTracker::new());
        let previews = Arc::new(PreviewCollection::new(
            Arc::clone(&tracker),
            config.max_previews,
        ));

        let renderer = FrameRenderer::new(
            hosts.engine,
            Arc::clone(&hosts.page),
            config.render_scale,
        );
        let display = DisplayCaptureService::new(
            hosts.media,
            Arc::clone(&hosts.page),
            Arc::clone(&tracker),
            config.clone(),
        );
        let selector = RegionSelector::new(hosts.selection, config.min_selection_px);
        let orchestrator = CaptureOrchestrator::new(
            renderer,
            display,
            selector,
            Arc::clone(&hosts.page),
            Arc::clone(&tracker),
            Arc::clone(&previews),
            config.clone(),
        );

        let uploader = ReportUploader::new(config.endpoint.clone());
        let hotkeys = HotkeyMap::new(config.hotkeys);

        Self {
            page: hosts.page,
            tracker,
            previews,
            diagnostics: Arc::new(ConsoleBuffer::new()),
            orchestrator,
            uploader,
            hotkeys,
            recording: Mutex::new(None),
            config,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// The console capture ring. Hosts record their console traffic here
    /// (or install it as a `log` sink); its contents ride along with
    /// submitted reports as `console.txt`.
    pub fn diagnostics(&self) -> Arc<ConsoleBuffer> {
        Arc::clone(&self.diagnostics)
    }

    /// Map a forwarded key event to the capture mode it triggers, if any.
    pub fn mode_for_key(&self, press: &KeyPress) -> Option<CaptureMode> {
        self.hotkeys.mode_for(press)
    }

    // ========================================================================
    // Captures
    // ========================================================================

    /// Run one still capture to completion.
    pub async fn capture(&self, mode: CaptureMode) -> CaptureOutcome {
        self.orchestrator.capture(mode).await
    }

    /// Start a screen recording.
    ///
    /// `Ok(true)` means a recording is running; `Ok(false)` means the user
    /// declined the share dialog. Starting while a recording is already
    /// active is an error; still captures during a recording are fine.
    pub async fn start_recording(&self) -> BugsnapResult<bool> {
        if self.recording.lock().is_some() {
            return Err(BugsnapError::RecordingError("already recording".into()));
        }
        match self.orchestrator.start_recording().await? {
            RecordingStart::Started(handle) => {
                let mut slot = self.recording.lock();
                if slot.is_some() {
                    drop(slot);
                    handle.discard();
                    return Err(BugsnapError::RecordingError("already recording".into()));
                }
                *slot = Some(handle);
                Ok(true)
            }
            RecordingStart::Declined => Ok(false),
        }
    }

    /// Stop the active recording and append the clip to the previews.
    pub async fn stop_recording(&self) -> BugsnapResult<CaptureOutcome> {
        let handle = self
            .recording
            .lock()
            .take()
            .ok_or_else(|| BugsnapError::RecordingError("no active recording".into()))?;
        Ok(self.orchestrator.finish_recording(handle).await)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.lock().is_some()
    }

    /// How long the active recording has been running, for countdown UI.
    pub fn recording_elapsed(&self) -> Option<Duration> {
        self.recording.lock().as_ref().map(|handle| handle.elapsed())
    }

    // ========================================================================
    // Previews
    // ========================================================================

    pub fn previews(&self) -> Vec<PreviewItemInfo> {
        self.previews.list()
    }

    /// Remove the preview at `number` (1-based). Later items renumber.
    pub fn remove_preview(&self, number: usize) -> bool {
        self.previews.remove_at(number)
    }

    pub fn clear_previews(&self) {
        self.previews.clear();
    }

    // ========================================================================
    // Report submission
    // ========================================================================

    /// Gather the current previews and console log into a report and upload
    /// it. On a fully accepted report the previews are cleared; on any
    /// failure they stay so the user can retry.
    pub async fn submit_report(
        &self,
        message: &str,
        progress: Option<ProgressCallback>,
    ) -> BugsnapResult<UploadResponse> {
        let draft = ReportDraft {
            page_url: self.page.page_url(),
            message: message.to_owned(),
        };
        let console_text = self.diagnostics.render_text();
        let fields = self.previews.with_items(|items| {
            gather_report_fields(
                &draft,
                items,
                Some(&console_text),
                self.config.image_thumb_max_width,
            )
        })?;

        let response = self.uploader.upload(fields, progress).await?;
        if response.ok {
            log::info!("[WIDGET] report accepted, clearing previews");
            self.previews.clear();
        }
        Ok(response)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release everything: abandon any active recording, drop all previews
    /// and revoke every live resource. The widget is inert afterwards but
    /// safe to keep calling.
    pub fn teardown(&self) {
        if let Some(handle) = self.recording.lock().take() {
            handle.discard();
        }
        self.previews.clear();
        self.tracker.revoke_all();
        log::debug!("[WIDGET] teardown complete");
    }
}

// ============================================================================
// Tests
// ============================================================================
