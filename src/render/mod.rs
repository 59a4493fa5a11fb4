//! DOM-to-raster capture through a pluggable render engine.
//!
//! The [`FrameRenderer`] drives a [`RenderEngine`] (html-to-canvas style
//! rasterizer in browser hosts) and owns the rules around it: the page is
//! rendered once at capture scale, cropping happens exactly once on the
//! rendered raster, and known CSS color incompatibilities get one narrow
//! retry after the host patches the offending styles.

use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;

use crate::error::{BugsnapError, BugsnapResult};
use crate::geometry::PageRect;
use crate::host::HostPage;


// ============================================================================
// Engine seam
// ============================================================================

#[derive(Debug, Error)]
pub enum RenderError {
    /// The engine itself could not be loaded or is missing.
    #[error("render engine unavailable: {0}")]
    Unavailable(String),
    /// The engine loaded but a render pass failed.
    #[error("{0}")]
    Failed(String),
}

/// Options for one render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Ask the engine to fetch cross-origin images with CORS.
    pub use_cors: bool,
    /// Raster scale relative to CSS pixels.
    pub scale: f64,
}

/// The DOM rasterizer. Browser hosts back this with a lazily loaded
/// html-to-canvas library; tests script it.
#[async_trait::async_trait]
pub trait RenderEngine: Send + Sync {
    /// Make sure the engine is loaded and usable.
    async fn ensure_loaded(&self) -> Result<(), RenderError>;

    /// Render the whole document to a raster at `options.scale`.
    async fn render_document(&self, options: RenderOptions) -> Result<RgbaImage, RenderError>;
}

// ============================================================================
// Crop selection
// ============================================================================

/// Which part of the rendered document a capture wants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropSpec {
    /// The full document raster, uncropped.
    Full,
    /// The currently visible viewport (scroll offsets plus viewport size).
    Viewport,
    /// A user-selected region in page coordinates.
    Region(PageRect),
}

// ============================================================================
// Frame renderer
// ============================================================================

/// Messages from html-to-canvas engines that indicate modern CSS color
/// syntax the engine cannot parse. Matched case-insensitively.
pub fn is_color_function_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("unsupported color function") || lower.contains("color-mix")
}

/// Renders the host document and crops the result per [`CropSpec`].
pub struct FrameRenderer {
    engine: Arc<dyn RenderEngine>,
    page: Arc<dyn HostPage>,
    render_scale: Option<f64>,
}

impl FrameRenderer {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        page: Arc<dyn HostPage>,
        render_scale: Option<f64>,
    ) -> Self {
        Self {
            engine,
            page,
            render_scale,
        }
    }

    /// Render the document and return the raster for `crop`.
    ///
    /// Page-coordinate rects are mapped to raster pixels by multiplying
    /// with the capture scale; scroll offsets are already part of page
    /// coordinates and are not applied again here.
    pub async fn render_region(&self, crop: CropSpec) -> BugsnapResult<RgbaImage> {
        if let Err(e) = self.engine.ensure_loaded().await {
            log::warn!("[RENDER] engine failed to load: {}", e);
            return Err(BugsnapError::RenderUnavailable);
        }

        let metrics = self.page.metrics();
        let scale = metrics.capture_scale(self.render_scale);
        let options = RenderOptions {
            use_cors: true,
            scale,
        };
        let raster = self.render_with_color_fallback(options).await?;

        let crop_rect = match crop {
            CropSpec::Full => return Ok(raster),
            CropSpec::Viewport => metrics.viewport_rect(),
            CropSpec::Region(rect) => rect,
        };
        let pixels = crop_rect.to_pixel_crop(scale);
        let clamped = pixels
            .clamp_to(raster.width(), raster.height())
            .ok_or_else(|| {
                BugsnapError::RenderFailed("crop region lies outside the rendered document".into())
            })?;
        log::debug!(
            "[RENDER] crop {}x{}+{}+{} from {}x{} raster",
            clamped.width,
            clamped.height,
            clamped.x,
            clamped.y,
            raster.width(),
            raster.height()
        );
        Ok(
            image::imageops::crop_imm(&raster, clamped.x, clamped.y, clamped.width, clamped.height)
                .to_image(),
        )
    }

    /// Render once; on a known color-syntax failure, let the host patch
    /// the offending styles and retry exactly once. The patch is undone
    /// whether or not the retry succeeds.
    async fn render_with_color_fallback(&self, options: RenderOptions) -> BugsnapResult<RgbaImage> {
        let first = self.engine.render_document(options).await;
        let message = match first {
            Ok(raster) => return Ok(raster),
            Err(RenderError::Unavailable(_)) => return Err(BugsnapError::RenderUnavailable),
            Err(RenderError::Failed(message)) => message,
        };
        if !is_color_function_error(&message) {
            return Err(BugsnapError::RenderFailed(message));
        }

        log::warn!("[RENDER] engine rejected modern color syntax, patching styles and retrying");
        let patch = self.page.neutralize_incompatible_colors();
        let retry = self.engine.render_document(options).await;
        self.page.restore_styles(patch);

        match retry {
            Ok(raster) => Ok(raster),
            Err(RenderError::Unavailable(_)) => Err(BugsnapError::RenderUnavailable),
            Err(RenderError::Failed(retry_message)) => {
                if is_color_function_error(&retry_message) {
                    Err(BugsnapError::RenderIncompatibility)
                } else {
                    Err(BugsnapError::RenderFailed(retry_message))
                }
            }
        }
    }
}
