//! Host page contract.
//!
//! The widget never owns the page it is embedded in. Everything it needs
//! from the surrounding DOM (viewport measurements, hiding its own chrome
//! out of captures, style patching for renderer compatibility, the cursor
//! highlight shown during recordings, video poster decoding) goes through
//! this trait, implemented by the embedding host and by scripted fakes in
//! tests.

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;
use thiserror::Error;

use crate::geometry::PageMetrics;

/// Errors from host page operations.
#[derive(Debug, Error)]
pub enum HostPageError {
    #[error("Video decode failed: {0}")]
    VideoDecode(String),
}

/// Saved attribute state for one element the widget hid.
///
/// `None` means the attribute was absent and must be removed again on
/// restore; restoring a hardcoded default instead is exactly the bug this
/// type exists to prevent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAttributes {
    /// Host-meaningful element key (selector plus position is typical).
    pub element: String,
    /// Prior `style` attribute text, if any.
    pub style: Option<String>,
    /// Prior `aria-hidden` value, if any.
    pub aria_hidden: Option<String>,
}

/// Everything `hide_widget_ui` hid, in restore order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HiddenUi {
    pub saved: Vec<SavedAttributes>,
}

/// Prior inline style of one element touched by a color patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedStyle {
    pub element: String,
    pub style: Option<String>,
}

/// Undo token for `neutralize_incompatible_colors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StylePatch {
    /// Stylesheets the host disabled (href or synthetic id).
    pub disabled_stylesheets: Vec<String>,
    /// Elements whose colors were inlined, with their prior inline style.
    pub inlined: Vec<SavedStyle>,
}

impl StylePatch {
    pub fn is_empty(&self) -> bool {
        self.disabled_stylesheets.is_empty() && self.inlined.is_empty()
    }
}

/// The embedding page, as the capture pipeline sees it.
#[async_trait]
pub trait HostPage: Send + Sync {
    /// Current scroll offsets, viewport extents and device pixel ratio.
    fn metrics(&self) -> PageMetrics;

    /// The page's own URL, submitted with reports.
    fn page_url(&self) -> String;

    /// Hide the widget's own chrome (preview strip, floating buttons) so it
    /// never shows up in captures. Returns exactly what must be restored.
    fn hide_widget_ui(&self) -> HiddenUi;

    /// Put back the attribute state `hide_widget_ui` saved, verbatim.
    fn restore_widget_ui(&self, hidden: HiddenUi);

    /// Defuse CSS color syntax the render engine cannot parse, as narrowly
    /// as the host can manage (disable offending same-origin stylesheets,
    /// inline computed colors on widget elements). Returns the undo token.
    fn neutralize_incompatible_colors(&self) -> StylePatch;

    /// Undo a `neutralize_incompatible_colors` patch.
    fn restore_styles(&self, patch: StylePatch);

    /// Show the cursor-highlight overlay while a recording runs. Pure UI;
    /// failures here must never fail a recording.
    fn show_cursor_highlight(&self);

    /// Remove the cursor-highlight overlay. Called from the recording
    /// teardown path; must be idempotent.
    fn remove_cursor_highlight(&self);

    /// Decode one frame of a finished recording at roughly `seek_secs`
    /// (an off-screen video element in browser hosts). Used for poster
    /// thumbnails.
    async fn decode_video_frame(
        &self,
        video: &Bytes,
        seek_secs: f64,
    ) -> Result<RgbaImage, HostPageError>;
}
