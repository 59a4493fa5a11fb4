//! Preview collection: the ordered strip of captured media.
//!
//! Items are numbered 1..n in completion order. Removing an item shifts
//! everything after it down, so the numbering never has gaps. The
//! collection owns its media outright; eviction and removal revoke the
//! underlying object URLs through the resource tracker.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use ts_rs::TS;

use crate::media::{CapturedMedia, MediaKind};
use crate::resources::ResourceTracker;

// ============================================================================
// Snapshot type
// ============================================================================

/// Value snapshot of one preview, safe to hand to UI code.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PreviewItemInfo {
    /// 1-based position in the strip.
    pub number: usize,
    pub kind: MediaKind,
    pub url: String,
    pub thumbnail_url: Option<String>,
    /// RFC 3339 capture timestamp.
    pub created_at: String,
}

// ============================================================================
// Collection
// ============================================================================

/// Bounded, ordered store of captured media.
pub struct PreviewCollection {
    tracker: Arc<ResourceTracker>,
    max_items: usize,
    items: Mutex<Vec<CapturedMedia>>,
}

impl PreviewCollection {
    pub fn new(tracker: Arc<ResourceTracker>, max_items: usize) -> Self {
        Self {
            tracker,
            max_items,
            items: Mutex::new(Vec::new()),
        }
    }

    /// Append a finished capture and return its 1-based number.
    ///
    /// At capacity the oldest item is evicted first and its URLs revoked,
    /// so the returned number is always `<= max_items`.
    pub fn add(&self, media: CapturedMedia) -> usize {
        let mut items = self.items.lock();
        if items.len() >= self.max_items && !items.is_empty() {
            let evicted = items.remove(0);
            self.revoke_media(&evicted);
            log::debug!(
                "[PREVIEW] at capacity ({}), evicted oldest preview",
                self.max_items
            );
        }
        items.push(media);
        items.len()
    }

    /// Remove the item with the given 1-based number and revoke its URLs.
    ///
    /// Items after it renumber down by one. Returns `false` when the
    /// number is out of range.
    pub fn remove_at(&self, number: usize) -> bool {
        let removed = {
            let mut items = self.items.lock();
            if number == 0 || number > items.len() {
                return false;
            }
            items.remove(number - 1)
        };
        self.revoke_media(&removed);
        log::debug!("[PREVIEW] removed preview #{}", number);
        true
    }

    /// Drop every preview and revoke all their URLs.
    pub fn clear(&self) {
        let drained: Vec<CapturedMedia> = std::mem::take(&mut *self.items.lock());
        for media in &drained {
            self.revoke_media(media);
        }
        if !drained.is_empty() {
            log::debug!("[PREVIEW] cleared {} previews", drained.len());
        }
    }

    /// Snapshot the strip in display order.
    pub fn list(&self) -> Vec<PreviewItemInfo> {
        self.items
            .lock()
            .iter()
            .enumerate()
            .map(|(index, media)| PreviewItemInfo {
                number: index + 1,
                kind: media.kind,
                url: media.blob.url().to_string(),
                thumbnail_url: media.thumbnail.as_ref().map(|t| t.url().to_string()),
                created_at: media.created_at.to_rfc3339(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Run `f` against the current items without copying payloads.
    /// `f` must not call back into this collection.
    pub fn with_items<R>(&self, f: impl FnOnce(&[CapturedMedia]) -> R) -> R {
        f(&self.items.lock())
    }

    fn revoke_media(&self, media: &CapturedMedia) {
        self.tracker.revoke(&media.blob);
        if let Some(thumbnail) = &media.thumbnail {
            self.tracker.revoke(thumbnail);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::media::{CapturedMedia, MediaKind};

    fn collection(max_items: usize) -> (PreviewCollection, Arc<ResourceTracker>) {
        let tracker = Arc::new(ResourceTracker::new());
        (
            PreviewCollection::new(Arc::clone(&tracker), max_items),
            tracker,
        )
    }

    fn image_item(tracker: &ResourceTracker, tag: u8) -> CapturedMedia {
        let blob = tracker.track_blob(Bytes::from(vec![tag; 16]), "image/png");
        CapturedMedia::image(blob)
    }

    fn video_item(tracker: &ResourceTracker, tag: u8) -> CapturedMedia {
        let blob = tracker.track_blob(Bytes::from(vec![tag; 32]), "video/webm");
        let poster = tracker.track_blob(Bytes::from(vec![tag; 8]), "image/png");
        CapturedMedia::video(blob, Some(poster))
    }

    #[test]
    fn numbers_are_assigned_in_completion_order() {
        let (previews, tracker) = collection(6);
        assert_eq!(previews.add(image_item(&tracker, 1)), 1);
        assert_eq!(previews.add(image_item(&tracker, 2)), 2);
        assert_eq!(previews.add(image_item(&tracker, 3)), 3);

        let listed = previews.list();
        assert_eq!(
            listed.iter().map(|p| p.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn removal_renumbers_contiguously() {
        let (previews, tracker) = collection(6);
        let urls: Vec<String> = (0..4)
            .map(|n| {
                previews.add(image_item(&tracker, n));
                previews.list().last().map(|p| p.url.clone()).unwrap()
            })
            .collect();

        assert!(previews.remove_at(2));
        let listed = previews.list();
        assert_eq!(
            listed.iter().map(|p| p.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        // Order preserved, only the removed URL is gone.
        assert_eq!(listed[0].url, urls[0]);
        assert_eq!(listed[1].url, urls[2]);
        assert_eq!(listed[2].url, urls[3]);
    }

    #[test]
    fn remove_revokes_the_backing_blob() {
        let (previews, tracker) = collection(6);
        previews.add(image_item(&tracker, 7));
        assert_eq!(tracker.live_count(), 1);

        assert!(previews.remove_at(1));
        assert_eq!(tracker.live_count(), 0);
    }

    #[test]
    fn interleaved_adds_and_removals_keep_numbers_contiguous() {
        let (previews, tracker) = collection(6);
        previews.add(image_item(&tracker, 1));
        previews.add(image_item(&tracker, 2));
        assert!(previews.remove_at(1));
        assert_eq!(previews.add(image_item(&tracker, 3)), 2);
        assert!(previews.remove_at(2));
        assert_eq!(previews.add(image_item(&tracker, 4)), 2);

        let numbers: Vec<usize> = previews.list().iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(tracker.live_count(), 2);
    }

    #[test]
    fn out_of_range_removals_are_rejected() {
        let (previews, tracker) = collection(6);
        previews.add(image_item(&tracker, 1));

        assert!(!previews.remove_at(0));
        assert!(!previews.remove_at(2));
        assert_eq!(previews.len(), 1);
    }

    #[test]
    fn capacity_eviction_drops_the_oldest() {
        let (previews, tracker) = collection(2);
        previews.add(image_item(&tracker, 1));
        previews.add(image_item(&tracker, 2));
        let second_url = previews.list()[1].url.clone();

        // Third add evicts the first; the collection stays at capacity
        // and the new item takes the last slot.
        let number = previews.add(image_item(&tracker, 3));
        assert_eq!(number, 2);
        assert_eq!(previews.len(), 2);
        assert_eq!(tracker.live_count(), 2);
        assert_eq!(previews.list()[0].url, second_url);
    }

    #[test]
    fn clear_revokes_every_handle_of_a_mixed_strip() {
        let (previews, tracker) = collection(6);
        for tag in 1..=3 {
            previews.add(image_item(&tracker, tag));
        }
        for tag in 4..=5 {
            previews.add(video_item(&tracker, tag));
        }
        // 3 image blobs + 2 video blobs + 2 posters.
        assert_eq!(previews.len(), 5);
        assert_eq!(tracker.live_count(), 7);

        previews.clear();
        assert!(previews.is_empty());
        assert_eq!(tracker.live_count(), 0);
    }

    #[test]
    fn list_exposes_video_thumbnails() {
        let (previews, tracker) = collection(6);
        let video_blob = tracker.track_blob(Bytes::from_static(b"webm"), "video/webm");
        let poster = tracker.track_blob(Bytes::from_static(b"png"), "image/png");
        previews.add(CapturedMedia::video(video_blob, Some(poster)));

        let listed = previews.list();
        assert_eq!(listed[0].kind, MediaKind::Video);
        assert!(listed[0].thumbnail_url.is_some());
    }
}
