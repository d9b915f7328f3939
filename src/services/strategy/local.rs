// Local inpaint strategy: mask bright overlay regions, fill them from
// their surroundings. No network, no model, no hidden randomness.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::core::config::LocalConfig;
use crate::core::errors::ProcessResult;
use crate::services::inpaint::{dilate, inpaint, threshold_mask};
use crate::services::strategy::RemovalStrategy;
use crate::utils::image_ops;

/// Tuning parameters for the local pipeline.
#[derive(Debug, Clone, Copy)]
pub struct LocalInpaintParams {
    /// Luminance cutoff for overlay detection. Higher = tighter mask.
    pub brightness_threshold: u8,
    /// Number of 3x3 dilation passes applied to the thresholded mask.
    pub dilation_iterations: u32,
    /// Sampling radius for region filling, >= 1.
    pub inpaint_radius: u32,
}

impl Default for LocalInpaintParams {
    fn default() -> Self {
        Self {
            brightness_threshold: 215,
            dilation_iterations: 1,
            inpaint_radius: 3,
        }
    }
}

impl From<&LocalConfig> for LocalInpaintParams {
    fn from(cfg: &LocalConfig) -> Self {
        Self {
            brightness_threshold: cfg.brightness_threshold,
            dilation_iterations: cfg.dilation_iterations,
            inpaint_radius: cfg.inpaint_radius,
        }
    }
}

/// Pure function of its inputs: identical bytes and parameters yield
/// byte-identical output.
pub struct LocalInpaintStrategy {
    params: LocalInpaintParams,
}

impl LocalInpaintStrategy {
    pub fn new(params: LocalInpaintParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LocalInpaintParams {
        &self.params
    }

    fn process_sync(bytes: &[u8], params: LocalInpaintParams) -> ProcessResult<Vec<u8>> {
        let img = image_ops::decode_rgb(bytes)?;

        let mut mask = threshold_mask(&img, params.brightness_threshold);
        for _ in 0..params.dilation_iterations {
            mask = dilate(&mask);
        }
        debug!(
            overlay_pixels = mask.overlay_count(),
            width = img.width(),
            height = img.height(),
            "mask built"
        );

        let restored = inpaint(&img, &mask, params.inpaint_radius)?;
        image_ops::encode_png_for_item(&restored)
    }
}

#[async_trait]
impl RemovalStrategy for LocalInpaintStrategy {
    fn name(&self) -> &'static str {
        "local-inpaint"
    }

    #[instrument(skip(self, image_bytes), fields(size = image_bytes.len()))]
    async fn process(
        &self,
        image_bytes: Arc<Vec<u8>>,
        _mime_type: &str,
    ) -> ProcessResult<Vec<u8>> {
        let params = self.params;
        image_ops::run_blocking(move || Self::process_sync(&image_bytes, params)).await
    }
}
