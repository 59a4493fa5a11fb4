//! Central error types for bugsnap.
//!
//! Every fallible operation in the crate returns [`BugsnapResult`]. The enum
//! implements `Serialize` as its display string so hosts can forward errors
//! across an IPC or postMessage boundary without any mapping layer.
//!
//! User cancellation is deliberately NOT an error: declined share prompts and
//! escaped selections flow through outcome enums (`SelectionOutcome`,
//! `FrameGrab`, `CaptureOutcome`), never through `BugsnapError`.

use serde::Serialize;
use thiserror::Error;

/// Main error type for bugsnap operations.
#[derive(Error, Debug)]
pub enum BugsnapError {
    /// DOM-to-canvas rendering engine failed to load or initialize
    #[error("Screenshot renderer unavailable")]
    RenderUnavailable,

    /// Rendering engine choked on CSS color syntax it cannot parse.
    /// Recoverable: triggers one narrowly-scoped style fix and retry.
    #[error("Page styles use color functions the renderer does not support")]
    RenderIncompatibility,

    /// Rendering engine failed for any other reason
    #[error("Render failed: {0}")]
    RenderFailed(String),

    /// Display stream never became playable, or kept producing black frames.
    /// Carries the user-facing guidance message.
    #[error("{0}")]
    StreamUnusable(String),

    /// Screen recording failed
    #[error("Recording error: {0}")]
    RecordingError(String),

    /// Report upload got a non-success HTTP status with no parseable body
    #[error("Upload failed with HTTP status {status}")]
    UploadFailed { status: u16 },

    /// Report upload reached the server but was rejected
    #[error("Report rejected: {0}")]
    UploadRejected(String),

    /// HTTP transport failed
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Upload response or payload was not the JSON we expected
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Raster encode or decode failed
    #[error("Image error: {0}")]
    ImageError(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all with a plain message
    #[error("{0}")]
    Other(String),
}

/// Serialize as the error message string so frontends render it directly.
impl Serialize for BugsnapError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<image::ImageError> for BugsnapError {
    fn from(err: image::ImageError) -> Self {
        BugsnapError::ImageError(err.to_string())
    }
}

impl From<String> for BugsnapError {
    fn from(msg: String) -> Self {
        BugsnapError::Other(msg)
    }
}

impl From<&str> for BugsnapError {
    fn from(msg: &str) -> Self {
        BugsnapError::Other(msg.to_string())
    }
}

/// Prefix any error with a human-readable context line on its way into
/// [`BugsnapError::Other`], in the style of anyhow's `Context`.
///
/// # Example
/// ```ignore
/// use crate::error::{BugsnapResult, ResultExt};
///
/// fn decode_frame(bytes: &[u8]) -> BugsnapResult<image::RgbaImage> {
///     let img = image::load_from_memory(bytes).context("failed to decode frame")?;
///     Ok(img.to_rgba8())
/// }
/// ```
pub trait ResultExt<T> {
    /// Wrap the error as `BugsnapError::Other("{msg}: {err}")`.
    fn context(self, msg: &str) -> BugsnapResult<T>;

    /// Lazy variant; the message closure runs only on the error path.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> BugsnapResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context(self, msg: &str) -> BugsnapResult<T> {
        self.map_err(|e| BugsnapError::Other(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> BugsnapResult<T> {
        self.map_err(|e| BugsnapError::Other(format!("{}: {}", f(), e)))
    }
}

/// The same context helpers for `Option`, mapping `None` to
/// [`BugsnapError::Other`] with the given message.
pub trait OptionExt<T> {
    fn context(self, msg: &str) -> BugsnapResult<T>;

    fn with_context<F: FnOnce() -> String>(self, f: F) -> BugsnapResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, msg: &str) -> BugsnapResult<T> {
        self.ok_or_else(|| BugsnapError::Other(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> BugsnapResult<T> {
        self.ok_or_else(|| BugsnapError::Other(f()))
    }
}

/// Type alias for Results using BugsnapError.
pub type BugsnapResult<T> = Result<T, BugsnapError>;
