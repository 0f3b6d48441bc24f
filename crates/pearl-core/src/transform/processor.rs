//! Transformation orchestration: orient, plan, scale, crop, blur, encode.

use std::sync::Arc;

use crate::codec::{Codec, Image, ResizeFilter};
use crate::config::ProcessorConfig;
use crate::error::CodecError;
use crate::types::{Dimensions, ProcessedImage, TransformRequest};

use super::geometry::{self, round_half_up};
use super::orientation;

/// Applies one processor configuration to decoded images.
///
/// Cheap to clone; the configuration is shared.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    config: Arc<ProcessorConfig>,
}

impl ImageProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Decode, transform and encode one image.
    ///
    /// When no step changes the image, the output is `bytes` unchanged. The
    /// codec handle is released before this returns, on success or failure.
    pub fn process(
        &self,
        codec: &dyn Codec,
        bytes: Vec<u8>,
        source_mime: &str,
        request: &TransformRequest,
    ) -> Result<ProcessedImage, CodecError> {
        let start = std::time::Instant::now();
        let mut image = Image::decode(codec, bytes, source_mime)?;
        let original = image.dimensions();

        let modified = self.apply(&mut image, request)?;
        let output = image.dimensions();
        let processed = image.finish(modified)?;

        tracing::debug!(
            "Processed {} -> {} in {:?} (modified: {})",
            original,
            output,
            start.elapsed(),
            modified
        );
        Ok(processed)
    }

    /// Run the transformation steps in order, mutating `image` in place.
    ///
    /// Returns whether any step modified it. Steps whose plan matches the
    /// image's current state make no codec calls.
    pub fn apply(&self, image: &mut Image, request: &TransformRequest) -> Result<bool, CodecError> {
        let config = &self.config;
        let mut modified = false;

        if config.auto_orient {
            modified |= orientation::normalize(image.handle_mut())?;
        }

        let requested = if request.dimensions.is_empty() {
            config.default_dimensions()
        } else {
            request.dimensions
        };
        let mode = request
            .scale_mode
            .unwrap_or_else(|| config.effective_scale_mode());

        let current = image.dimensions();
        let plan = geometry::plan(current, requested, mode, config.max_dimensions());

        if !plan.scale.is_empty() && plan.scale != current {
            self.scale(image, plan.scale)?;
            modified = true;
        }

        if !plan.crop.is_empty() {
            modified |= crop(image, plan.crop, request)?;
        }

        if request.blur_fraction != 0.0 {
            modified |= self.blur(image, request.blur_fraction)?;
        }

        Ok(modified)
    }

    fn scale(&self, image: &mut Image, target: Dimensions) -> Result<(), CodecError> {
        let scale_err = |e: crate::codec::PrimitiveError| CodecError::Scale(e.to_string());
        let handle = image.handle_mut();

        handle
            .resize(target.width, target.height, ResizeFilter::Lanczos)
            .map_err(scale_err)?;
        handle.strip_metadata().map_err(scale_err)?;
        if handle.format() == "jpeg" {
            handle.set_interlaced(true).map_err(scale_err)?;
            handle
                .set_compression_quality(self.config.image_compression_quality)
                .map_err(scale_err)?;
        }

        tracing::trace!("Scaled to {}", target);
        Ok(())
    }

    fn blur(&self, image: &mut Image, fraction: f64) -> Result<bool, CodecError> {
        let width = f64::from(image.dimensions().width);
        let radius = width * fraction * self.config.max_blur_radius_percentage;
        if radius.is_nan() || radius <= 0.0 {
            return Ok(false);
        }
        image
            .handle_mut()
            .gaussian_blur(radius, radius)
            .map_err(|e| CodecError::Blur(e.to_string()))?;

        tracing::trace!("Blurred with radius {:.2}", radius);
        Ok(true)
    }
}

/// Crop to `target`, positioned by the request's focal point. The region
/// never extends past the image.
fn crop(
    image: &mut Image,
    target: Dimensions,
    request: &TransformRequest,
) -> Result<bool, CodecError> {
    let current = image.dimensions();
    let region = Dimensions::new(
        target.width.min(current.width),
        target.height.min(current.height),
    );
    if region == current || region.width == 0 || region.height == 0 {
        return Ok(false);
    }

    let focal = request.focalpoint.clamped();
    let x = crop_origin(current.width, region.width, focal.x);
    let y = crop_origin(current.height, region.height, focal.y);

    image
        .handle_mut()
        .crop(region.width, region.height, x, y)
        .map_err(|e| CodecError::Crop(e.to_string()))?;

    tracing::trace!("Cropped to {} at ({}, {})", region, x, y);
    Ok(true)
}

/// Offset along one axis that places the focal point proportionally within
/// the slack. Negative slack saturates to zero.
pub fn crop_origin(current: u32, crop: u32, focal: f64) -> u32 {
    round_half_up(focal * (f64::from(current) - f64::from(crop)))
}
