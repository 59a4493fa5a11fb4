//! Captured media model and raster helpers.
//!
//! `CapturedMedia` is what a successful capture produces: the blob handle,
//! an optional poster thumbnail (recordings), kind and timestamp. The raster
//! helpers cover the pixel-level plumbing every capture path shares: PNG
//! encoding, JPEG thumbnail downscaling, poster bounding, and the darkness
//! probe used by black-frame detection.

use std::io::Cursor;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::BugsnapResult;
use crate::resources::OwnedBlobHandle;

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_WEBM: &str = "video/webm";

/// JPEG quality for report thumbnails.
const THUMB_JPEG_QUALITY: u8 = 80;

// ============================================================================
// Media model
// ============================================================================

/// What kind of media a capture produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum MediaKind {
    Image,
    Video,
}

/// An owned, successfully captured item.
///
/// Exclusively owned by the preview collection once appended; views outside
/// the collection receive value snapshots (`PreviewItemInfo`), never the
/// handles themselves.
#[derive(Debug)]
pub struct CapturedMedia {
    pub id: Uuid,
    pub kind: MediaKind,
    pub blob: OwnedBlobHandle,
    pub thumbnail: Option<OwnedBlobHandle>,
    pub created_at: DateTime<Utc>,
}

impl CapturedMedia {
    pub fn image(blob: OwnedBlobHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MediaKind::Image,
            blob,
            thumbnail: None,
            created_at: Utc::now(),
        }
    }

    pub fn video(blob: OwnedBlobHandle, thumbnail: Option<OwnedBlobHandle>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MediaKind::Video,
            blob,
            thumbnail,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Raster helpers
// ============================================================================

/// Encode a frame as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> BugsnapResult<Bytes> {
    let dynamic = DynamicImage::ImageRgba8(image.clone());
    let mut buffer = Cursor::new(Vec::new());
    dynamic.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(Bytes::from(buffer.into_inner()))
}

/// Downscale to at most `max_width` wide (aspect preserved) and encode as
/// JPEG. Frames already narrow enough are encoded as-is.
pub fn jpeg_thumbnail(image: &RgbaImage, max_width: u32) -> BugsnapResult<Bytes> {
    let (w, h) = image.dimensions();
    let scaled;
    let source = if w > max_width && max_width > 0 {
        let target_h = ((h as f64) * (max_width as f64) / (w as f64)).round().max(1.0) as u32;
        scaled = image::imageops::resize(image, max_width, target_h, FilterType::Triangle);
        &scaled
    } else {
        image
    };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(source.clone()).to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, THUMB_JPEG_QUALITY)
        .encode_image(&rgb)?;
    Ok(Bytes::from(buffer.into_inner()))
}

/// Fit a decoded poster frame into the given bounds (aspect preserved, never
/// upscaled) and encode as PNG.
pub fn bounded_poster(image: &RgbaImage, max_size: (u32, u32)) -> BugsnapResult<Bytes> {
    let (w, h) = image.dimensions();
    let (max_w, max_h) = max_size;

    if w == 0 || h == 0 || max_w == 0 || max_h == 0 {
        return encode_png(image);
    }

    let scale = (max_w as f64 / w as f64)
        .min(max_h as f64 / h as f64)
        .min(1.0);
    if scale >= 1.0 {
        return encode_png(image);
    }

    let target_w = ((w as f64) * scale).round().max(1.0) as u32;
    let target_h = ((h as f64) * scale).round().max(1.0) as u32;
    let resized = image::imageops::resize(image, target_w, target_h, FilterType::Triangle);
    encode_png(&resized)
}

/// Darkness probe for black-frame detection: sample the top-left pixel and
/// compare summed RGB against the threshold. Empty frames count as black.
pub fn looks_black(image: &RgbaImage, threshold: u32) -> bool {
    if image.width() == 0 || image.height() == 0 {
        return true;
    }
    let px = image.get_pixel(0, 0);
    let intensity = px[0] as u32 + px[1] as u32 + px[2] as u32;
    intensity < threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    #[test]
    fn test_encode_png_roundtrip_dimensions() {
        let img = solid(40, 25, [120, 40, 200, 255]);
        let png = encode_png(&img).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 40);
        assert_eq!(decoded.height(), 25);
    }

    #[test]
    fn test_jpeg_thumbnail_caps_width_and_keeps_aspect() {
        let img = solid(640, 480, [200, 200, 200, 255]);
        let jpeg = jpeg_thumbnail(&img, 320).unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 320);
        assert_eq!(decoded.height(), 240);
    }

    #[test]
    fn test_jpeg_thumbnail_leaves_narrow_images_alone() {
        let img = solid(100, 80, [10, 20, 30, 255]);
        let jpeg = jpeg_thumbnail(&img, 320).unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 80);
    }

    #[test]
    fn test_bounded_poster_fits_within_bounds() {
        let img = solid(1280, 720, [50, 90, 130, 255]);
        let png = bounded_poster(&img, (320, 180)).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 320);
        assert_eq!(decoded.height(), 180);
    }

    #[test]
    fn test_bounded_poster_never_upscales() {
        let img = solid(160, 90, [50, 90, 130, 255]);
        let png = bounded_poster(&img, (320, 180)).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 160);
        assert_eq!(decoded.height(), 90);
    }

    #[test]
    fn test_looks_black_threshold_boundary() {
        // 3 + 3 + 3 = 9 < 10: black.
        assert!(looks_black(&solid(4, 4, [3, 3, 3, 255]), 10));
        // 4 + 3 + 3 = 10, not strictly below: not black.
        assert!(!looks_black(&solid(4, 4, [4, 3, 3, 255]), 10));
        assert!(!looks_black(&solid(4, 4, [255, 255, 255, 255]), 10));
    }

    #[test]
    fn test_looks_black_empty_frame() {
        let empty = RgbaImage::new(0, 0);
        assert!(looks_black(&empty, 10));
    }
}
