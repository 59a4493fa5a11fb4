//! Blob-URL and stream-track bookkeeping.
//!
//! Every transient resource a capture produces (materialized blob URLs and
//! live display streams) is registered here, so repeated captures never
//! leak and page teardown can release everything in one call. Revocation is
//! idempotent: releasing something twice is a no-op, and a handle knows when
//! its payload is gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{BugsnapError, BugsnapResult};

// ============================================================================
// Handles
// ============================================================================

/// Single-owner wrapper around captured binary data and its materialized URL.
///
/// Deliberately not `Clone`: ownership lives with whoever holds the value
/// (in practice the preview collection); everyone else gets the URL string
/// or a borrowed payload. After revocation the payload is inaccessible.
#[derive(Debug)]
pub struct OwnedBlobHandle {
    id: Uuid,
    url: String,
    mime: String,
    payload: Bytes,
    revoked: Arc<AtomicBool>,
}

impl OwnedBlobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The materialized object URL (`blob:widget/<uuid>`). Valid until the
    /// handle is revoked; hosts resolve it back through the tracker.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Borrow the binary payload. Fails after revocation so stale borrows
    /// surface as errors instead of silently reading freed data.
    pub fn payload(&self) -> BugsnapResult<&Bytes> {
        if self.is_revoked() {
            return Err(BugsnapError::Other(format!(
                "blob {} used after revocation",
                self.url
            )));
        }
        Ok(&self.payload)
    }

    /// Render the payload as a `data:` URL for inline carousel use.
    pub fn to_data_url(&self) -> BugsnapResult<String> {
        let payload = self.payload()?;
        Ok(format!(
            "data:{};base64,{}",
            self.mime,
            STANDARD.encode(payload)
        ))
    }
}

/// Claim ticket for a registered display stream. Releasing it stops the
/// stream's tracks; releasing twice is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTicket {
    id: Uuid,
}

// ============================================================================
// Tracker
// ============================================================================

enum TrackedEntry {
    Blob {
        url: String,
        revoked: Arc<AtomicBool>,
    },
    Stream {
        stopper: Box<dyn FnOnce() + Send>,
    },
}

/// Registry of outstanding transient resources.
///
/// One instance per widget, shared via `Arc`. All mutation goes through this
/// API; nothing else touches the live set.
#[derive(Default)]
pub struct ResourceTracker {
    live: Mutex<HashMap<Uuid, TrackedEntry>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register captured bytes and hand back the owning handle with a fresh
    /// object URL.
    pub fn track_blob(&self, payload: Bytes, mime: &str) -> OwnedBlobHandle {
        let id = Uuid::new_v4();
        let url = format!("blob:widget/{}", id);
        let revoked = Arc::new(AtomicBool::new(false));

        self.live.lock().insert(
            id,
            TrackedEntry::Blob {
                url: url.clone(),
                revoked: Arc::clone(&revoked),
            },
        );
        log::debug!("[RESOURCE] tracked blob {} ({} bytes)", url, payload.len());

        OwnedBlobHandle {
            id,
            url,
            mime: mime.to_string(),
            payload,
            revoked,
        }
    }

    /// Revoke a blob URL. Idempotent: unknown or already-revoked handles are
    /// silently ignored.
    pub fn revoke(&self, handle: &OwnedBlobHandle) {
        let entry = self.live.lock().remove(&handle.id);
        match entry {
            Some(TrackedEntry::Blob { url, revoked }) => {
                revoked.store(true, Ordering::Release);
                log::debug!("[RESOURCE] revoked {}", url);
            }
            Some(other) => {
                // Id collision across kinds cannot happen with v4 ids; put it back.
                self.live.lock().insert(handle.id, other);
            }
            None => {}
        }
    }

    /// Register a live display stream's stop action. The tracker guarantees
    /// it runs at most once, via `release_stream` or `revoke_all`.
    pub fn register_stream(&self, stopper: impl FnOnce() + Send + 'static) -> StreamTicket {
        let id = Uuid::new_v4();
        self.live.lock().insert(
            id,
            TrackedEntry::Stream {
                stopper: Box::new(stopper),
            },
        );
        log::debug!("[RESOURCE] registered stream {}", id);
        StreamTicket { id }
    }

    /// Stop a registered stream's tracks. Idempotent.
    pub fn release_stream(&self, ticket: &StreamTicket) {
        let entry = self.live.lock().remove(&ticket.id);
        match entry {
            Some(TrackedEntry::Stream { stopper }) => {
                stopper();
                log::debug!("[RESOURCE] released stream {}", ticket.id);
            }
            Some(other) => {
                self.live.lock().insert(ticket.id, other);
            }
            None => {}
        }
    }

    /// Page-teardown hook: revoke every outstanding blob URL and stop every
    /// outstanding stream.
    pub fn revoke_all(&self) {
        let drained: Vec<(Uuid, TrackedEntry)> = self.live.lock().drain().collect();
        let count = drained.len();
        for (_, entry) in drained {
            match entry {
                TrackedEntry::Blob { revoked, .. } => revoked.store(true, Ordering::Release),
                TrackedEntry::Stream { stopper } => stopper(),
            }
        }
        if count > 0 {
            log::debug!("[RESOURCE] revoke_all released {} resources", count);
        }
    }

    /// Number of resources currently outstanding.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_live(&self, handle: &OwnedBlobHandle) -> bool {
        self.live.lock().contains_key(&handle.id)
    }
}
