//! Report assembly and upload.
//!
//! Gathering is a pure pass over the preview items: it turns them into an
//! ordered list of form fields (`page_url`, `message`, then one
//! `attachments[]` file per item with an index-aligned
//! `attachments_thumb[i]` where a thumbnail could be produced, then the
//! console log). Upload streams those fields as one multipart POST and
//! reports byte progress through an optional callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{BugsnapError, BugsnapResult};
use crate::media::{self, CapturedMedia, MediaKind, MIME_JPEG, MIME_PNG};
use crate::resources::OwnedBlobHandle;

// ============================================================================
// Constants
// ============================================================================

/// Form field name the server expects for every attached file.
const ATTACHMENTS_FIELD: &str = "attachments[]";

/// File name for the attached console log.
const CONSOLE_LOG_FILE: &str = "console.txt";

const MIME_TEXT: &str = "text/plain";

/// Upload streams are fed in chunks this large so progress callbacks get
/// a usable resolution on multi-megabyte recordings.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

// ============================================================================
// Draft and form model
// ============================================================================

/// What the user typed, plus where they were.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReportDraft {
    pub page_url: String,
    pub message: String,
}

/// One field of the outgoing multipart form, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        data: Bytes,
    },
}

impl FormField {
    pub fn name(&self) -> &str {
        match self {
            FormField::Text { name, .. } => name,
            FormField::File { name, .. } => name,
        }
    }
}

// ============================================================================
// Gathering
// ============================================================================

/// Flatten a draft and the current previews into form fields.
///
/// Attachment files are named `screenshot_<n>.png` / `recording_<n>.webm`
/// by their 1-based preview number. Thumbnail fields are keyed by the
/// 0-based index of the attachment they belong to, so the server can
/// align them even when some items have no thumbnail.
pub fn gather_report_fields(
    draft: &ReportDraft,
    items: &[CapturedMedia],
    console_text: Option<&str>,
    thumb_max_width: u32,
) -> BugsnapResult<Vec<FormField>> {
    let mut fields = vec![
        FormField::Text {
            name: "page_url".into(),
            value: draft.page_url.clone(),
        },
        FormField::Text {
            name: "message".into(),
            value: draft.message.clone(),
        },
    ];

    for (index, item) in items.iter().enumerate() {
        let number = index + 1;
        match item.kind {
            MediaKind::Image => {
                let data = item.blob.payload()?.clone();
                let thumb = thumbnail_from_encoded(&data, thumb_max_width);
                fields.push(FormField::File {
                    name: ATTACHMENTS_FIELD.into(),
                    file_name: format!("screenshot_{}.png", number),
                    mime: MIME_PNG.into(),
                    data,
                });
                if let Some(thumb) = thumb {
                    fields.push(FormField::File {
                        name: format!("attachments_thumb[{}]", index),
                        file_name: format!("screenshot_{}_thumb.jpg", number),
                        mime: MIME_JPEG.into(),
                        data: thumb,
                    });
                }
            }
            MediaKind::Video => {
                let data = item.blob.payload()?.clone();
                fields.push(FormField::File {
                    name: ATTACHMENTS_FIELD.into(),
                    file_name: format!("recording_{}.webm", number),
                    mime: item.blob.mime().to_string(),
                    data,
                });
                if let Some(thumb) = item
                    .thumbnail
                    .as_ref()
                    .and_then(|poster| poster_thumbnail(poster, thumb_max_width))
                {
                    fields.push(FormField::File {
                        name: format!("attachments_thumb[{}]", index),
                        file_name: format!("recording_{}_thumb.jpg", number),
                        mime: MIME_JPEG.into(),
                        data: thumb,
                    });
                }
            }
        }
    }

    if let Some(text) = console_text {
        if !text.is_empty() {
            fields.push(FormField::File {
                name: ATTACHMENTS_FIELD.into(),
                file_name: CONSOLE_LOG_FILE.into(),
                mime: MIME_TEXT.into(),
                data: Bytes::from(text.to_owned()),
            });
        }
    }

    Ok(fields)
}

/// Re-encode captured PNG bytes as a width-capped JPEG thumbnail.
/// Items whose bytes will not decode just go up without one.
fn thumbnail_from_encoded(encoded: &Bytes, max_width: u32) -> Option<Bytes> {
    let decoded = match image::load_from_memory(encoded) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            log::warn!("[REPORT] thumbnail decode failed: {}", e);
            return None;
        }
    };
    match media::jpeg_thumbnail(&decoded, max_width) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("[REPORT] thumbnail encode failed: {}", e);
            None
        }
    }
}

fn poster_thumbnail(poster: &OwnedBlobHandle, max_width: u32) -> Option<Bytes> {
    match poster.payload() {
        Ok(bytes) => thumbnail_from_encoded(bytes, max_width),
        Err(e) => {
            log::warn!("[REPORT] poster unavailable: {}", e);
            None
        }
    }
}

// ============================================================================
// Upload
// ============================================================================

/// Attachment-byte progress of a running upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UploadProgress {
    pub sent_bytes: u64,
    pub total_bytes: u64,
}

pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Server verdict on one uploaded file. Field names follow the server's
/// JSON verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UploadedFileStatus {
    #[serde(default)]
    pub index: usize,
    pub name: String,
    #[serde(default)]
    pub saved_path: Option<String>,
    #[serde(default)]
    pub saved_thumb_path: Option<String>,
    #[serde(default)]
    pub inserted: Option<bool>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Parsed upload response. `ok: false` with a 2xx status means the server
/// accepted the request but rejected some or all of its content; callers
/// decide what to do with the per-file detail.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UploadResponse {
    pub ok: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub files: Vec<UploadedFileStatus>,
}

/// Posts gathered reports to the configured endpoint.
pub struct ReportUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl ReportUploader {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Send one report as a multipart POST.
    ///
    /// `progress` is invoked as attachment bytes are handed to the
    /// transport; text fields do not count toward the totals.
    pub async fn upload(
        &self,
        fields: Vec<FormField>,
        progress: Option<ProgressCallback>,
    ) -> BugsnapResult<UploadResponse> {
        if self.endpoint.is_empty() {
            return Err(BugsnapError::InvalidConfig(
                "no upload endpoint configured".into(),
            ));
        }

        let total_bytes: u64 = fields
            .iter()
            .map(|field| match field {
                FormField::File { data, .. } => data.len() as u64,
                FormField::Text { .. } => 0,
            })
            .sum();
        let sent = Arc::new(AtomicU64::new(0));

        let mut form = reqwest::multipart::Form::new();
        for field in fields {
            match field {
                FormField::Text { name, value } => {
                    form = form.text(name, value);
                }
                FormField::File {
                    name,
                    file_name,
                    mime,
                    data,
                } => {
                    let part = progress_part(
                        data,
                        &file_name,
                        &mime,
                        total_bytes,
                        Arc::clone(&sent),
                        progress.clone(),
                    )?;
                    form = form.part(name, part);
                }
            }
        }

        log::debug!(
            "[REPORT] uploading {} attachment bytes to {}",
            total_bytes,
            self.endpoint
        );
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<UploadResponse>(&body) {
            Ok(parsed) if status.is_success() => {
                if parsed.ok {
                    log::info!("[REPORT] submitted, id {:?}", parsed.id);
                } else {
                    log::warn!("[REPORT] server reported failure: {:?}", parsed.error);
                }
                Ok(parsed)
            }
            Ok(parsed) => Err(BugsnapError::UploadRejected(
                parsed
                    .error
                    .unwrap_or_else(|| format!("rejected with HTTP status {}", status.as_u16())),
            )),
            Err(_) if !status.is_success() => Err(BugsnapError::UploadFailed {
                status: status.as_u16(),
            }),
            Err(e) => Err(BugsnapError::JsonError(e)),
        }
    }
}

/// Wrap file bytes in a chunked stream that bumps the shared progress
/// counter as the transport consumes it.
fn progress_part(
    data: Bytes,
    file_name: &str,
    mime: &str,
    total_bytes: u64,
    sent: Arc<AtomicU64>,
    progress: Option<ProgressCallback>,
) -> BugsnapResult<reqwest::multipart::Part> {
    let len = data.len() as u64;
    let chunks = chunk_bytes(data);
    let chunk_stream = stream::iter(chunks.into_iter().map(move |chunk| {
        let sent_bytes = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
        if let Some(callback) = &progress {
            callback(UploadProgress {
                sent_bytes,
                total_bytes,
            });
        }
        Ok::<Bytes, std::io::Error>(chunk)
    }));

    let part = reqwest::multipart::Part::stream_with_length(
        reqwest::Body::wrap_stream(chunk_stream),
        len,
    )
    .file_name(file_name.to_owned())
    .mime_str(mime)?;
    Ok(part)
}

/// Split into `UPLOAD_CHUNK_BYTES` slices without copying.
fn chunk_bytes(data: Bytes) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(data.len() / UPLOAD_CHUNK_BYTES + 1);
    let mut rest = data;
    while rest.len() > UPLOAD_CHUNK_BYTES {
        chunks.push(rest.split_to(UPLOAD_CHUNK_BYTES));
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

// ============================================================================
// Tests
// ============================================================================
