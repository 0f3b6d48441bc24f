//! Codec backed by the `image` crate, with EXIF orientation read through
//! `kamadak-exif`.

use std::io::Cursor;

use exif::{In, Reader, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use super::{
    Codec, CodecHandle, Orientation, PrimitiveError, PrimitiveResult, ResizeFilter, Rotation,
};
use crate::types::Dimensions;

/// JPEG quality used when nothing sets one explicitly.
const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Largest width or height a resize may produce.
pub const MAX_DIMENSION: u32 = 32768;

/// Memory a single resize may allocate, the decoder's default `max_alloc`.
pub const MAX_RESIZE_ALLOC: u64 = 512 * 1024 * 1024;

/// Resampling goes through an `Rgba<f32>` buffer.
const RESAMPLE_BYTES_PER_PIXEL: u64 = 16;

/// Pure-Rust codec. Decodes anything the `image` crate can read and
/// re-encodes in the same format.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageRsCodec;

impl ImageRsCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for ImageRsCodec {
    fn name(&self) -> &'static str {
        "image-rs"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn CodecHandle>, PrimitiveError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PrimitiveError::new(format!("Cannot detect image format: {e}")))?;
        let format = reader
            .format()
            .ok_or_else(|| PrimitiveError::new("Unrecognized image format"))?;
        let image = reader
            .decode()
            .map_err(|e| PrimitiveError::new(e.to_string()))?;

        Ok(Box::new(ImageRsHandle {
            image,
            format,
            format_name: format_to_string(format),
            orientation: read_orientation(bytes),
            quality: DEFAULT_JPEG_QUALITY,
            interlaced: false,
        }))
    }
}

/// A decoded `DynamicImage` plus the encode settings applied to it.
pub struct ImageRsHandle {
    image: DynamicImage,
    format: ImageFormat,
    format_name: &'static str,
    orientation: Option<Orientation>,
    quality: u8,
    interlaced: bool,
}

impl CodecHandle for ImageRsHandle {
    fn dimensions(&self) -> Dimensions {
        let (width, height) = self.image.dimensions();
        Dimensions::new(width, height)
    }

    fn format(&self) -> &str {
        self.format_name
    }

    fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = Some(orientation);
    }

    fn resize(&mut self, width: u32, height: u32, filter: ResizeFilter) -> PrimitiveResult {
        if width == 0 || height == 0 {
            return Err(PrimitiveError::new(format!(
                "Cannot resize to {width}x{height}"
            )));
        }
        check_resize_budget(self.image.width(), width, height)?;
        let filter = match filter {
            ResizeFilter::Lanczos => FilterType::Lanczos3,
        };
        self.image = self.image.resize_exact(width, height, filter);
        Ok(())
    }

    fn crop(&mut self, width: u32, height: u32, x: u32, y: u32) -> PrimitiveResult {
        let (w, h) = self.image.dimensions();
        let fits = x.checked_add(width).is_some_and(|r| r <= w)
            && y.checked_add(height).is_some_and(|b| b <= h);
        if width == 0 || height == 0 || !fits {
            return Err(PrimitiveError::new(format!(
                "Crop {width}x{height}+{x}+{y} is outside the {w}x{h} image"
            )));
        }
        self.image = self.image.crop_imm(x, y, width, height);
        Ok(())
    }

    fn flip_horizontal(&mut self) -> PrimitiveResult {
        self.image = self.image.fliph();
        Ok(())
    }

    fn flip_vertical(&mut self) -> PrimitiveResult {
        self.image = self.image.flipv();
        Ok(())
    }

    fn rotate(&mut self, rotation: Rotation) -> PrimitiveResult {
        self.image = match rotation {
            Rotation::Quarter => self.image.rotate90(),
            Rotation::Half => self.image.rotate180(),
            Rotation::ThreeQuarter => self.image.rotate270(),
        };
        Ok(())
    }

    fn transpose(&mut self) -> PrimitiveResult {
        self.image = self.image.rotate90().fliph();
        Ok(())
    }

    fn transverse(&mut self) -> PrimitiveResult {
        self.image = self.image.rotate270().fliph();
        Ok(())
    }

    fn gaussian_blur(&mut self, radius_x: f64, radius_y: f64) -> PrimitiveResult {
        // The blur is isotropic; the larger radius is used as sigma.
        let sigma = radius_x.max(radius_y);
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(PrimitiveError::new(format!("Invalid blur radius {sigma}")));
        }
        if sigma > 0.0 {
            self.image = self.image.blur(sigma as f32);
        }
        Ok(())
    }

    fn set_compression_quality(&mut self, quality: u8) -> PrimitiveResult {
        if !(1..=100).contains(&quality) {
            return Err(PrimitiveError::new(format!("Invalid quality {quality}")));
        }
        self.quality = quality;
        Ok(())
    }

    fn set_interlaced(&mut self, interlaced: bool) -> PrimitiveResult {
        self.interlaced = interlaced;
        Ok(())
    }

    fn strip_metadata(&mut self) -> PrimitiveResult {
        // Encoders here never write metadata back; forget what was read.
        self.orientation = None;
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>, PrimitiveError> {
        let mut buf = Cursor::new(Vec::new());
        match self.format {
            ImageFormat::Jpeg if self.interlaced => {
                return encode_progressive_jpeg(&self.image, self.quality);
            }
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel.
                let rgb = DynamicImage::ImageRgb8(self.image.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
                rgb.write_with_encoder(encoder)
                    .map_err(|e| PrimitiveError::new(e.to_string()))?;
            }
            format => {
                self.image
                    .write_to(&mut buf, format)
                    .map_err(|e| PrimitiveError::new(e.to_string()))?;
            }
        }
        Ok(buf.into_inner())
    }
}

/// Reject resize targets whose buffers would exceed [`MAX_RESIZE_ALLOC`].
///
/// Vertical resampling runs first, so the intermediate is the source width
/// by the target height.
fn check_resize_budget(source_width: u32, width: u32, height: u32) -> PrimitiveResult {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PrimitiveError::new(format!(
            "Resize target {width}x{height} exceeds the {MAX_DIMENSION}px limit"
        )));
    }
    let pixels = (u64::from(source_width) + u64::from(width)) * u64::from(height);
    let bytes = pixels.saturating_mul(RESAMPLE_BYTES_PER_PIXEL);
    if bytes > MAX_RESIZE_ALLOC {
        return Err(PrimitiveError::new(format!(
            "Resize to {width}x{height} needs {bytes} bytes (limit {MAX_RESIZE_ALLOC})"
        )));
    }
    Ok(())
}

/// Progressive JPEG through `jpeg-encoder`; image-rs only writes baseline.
fn encode_progressive_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, PrimitiveError> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let too_large = || PrimitiveError::new(format!("{width}x{height} is too large for JPEG"));
    let width = u16::try_from(width).map_err(|_| too_large())?;
    let height = u16::try_from(height).map_err(|_| too_large())?;

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality);
    encoder.set_progressive(true);
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| PrimitiveError::new(e.to_string()))?;
    Ok(out)
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Ico => "ico",
        ImageFormat::Pnm => "pnm",
        ImageFormat::Avif => "avif",
        _ => "unknown",
    }
}

/// Read the EXIF orientation tag. Missing or malformed EXIF yields `None`.
fn read_orientation(bytes: &[u8]) -> Option<Orientation> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    let value = match &field.value {
        Value::Short(v) => v.first().map(|&x| x as u32),
        Value::Long(v) => v.first().copied(),
        _ => None,
    }?;
    Orientation::from_exif(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn decode(bytes: &[u8]) -> Box<dyn CodecHandle> {
        ImageRsCodec::new().decode(bytes).unwrap()
    }

    #[test]
    fn test_format_to_string() {
        assert_eq!(format_to_string(ImageFormat::Jpeg), "jpeg");
        assert_eq!(format_to_string(ImageFormat::Png), "png");
        assert_eq!(format_to_string(ImageFormat::WebP), "webp");
    }

    #[test]
    fn test_decode_detects_format_by_content() {
        let handle = decode(&encoded(40, 20, ImageFormat::Png));
        assert_eq!(handle.format(), "png");
        assert_eq!(handle.dimensions(), Dimensions::new(40, 20));
        assert_eq!(handle.orientation(), None);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(ImageRsCodec::new().decode(b"not an image").is_err());
    }

    #[test]
    fn test_resize_and_crop() {
        let mut handle = decode(&encoded(100, 50, ImageFormat::Png));
        handle.resize(60, 30, ResizeFilter::Lanczos).unwrap();
        assert_eq!(handle.dimensions(), Dimensions::new(60, 30));

        handle.crop(30, 30, 15, 0).unwrap();
        assert_eq!(handle.dimensions(), Dimensions::new(30, 30));
    }

    #[test]
    fn test_crop_out_of_bounds_leaves_image_unchanged() {
        let mut handle = decode(&encoded(100, 50, ImageFormat::Png));
        assert!(handle.crop(80, 50, 30, 0).is_err());
        assert!(handle.crop(0, 10, 0, 0).is_err());
        assert_eq!(handle.dimensions(), Dimensions::new(100, 50));
    }

    #[test]
    fn test_rotations_swap_axes() {
        let mut handle = decode(&encoded(40, 20, ImageFormat::Png));
        handle.rotate(Rotation::Quarter).unwrap();
        assert_eq!(handle.dimensions(), Dimensions::new(20, 40));
        handle.rotate(Rotation::Half).unwrap();
        assert_eq!(handle.dimensions(), Dimensions::new(20, 40));
        handle.transpose().unwrap();
        assert_eq!(handle.dimensions(), Dimensions::new(40, 20));
        handle.transverse().unwrap();
        assert_eq!(handle.dimensions(), Dimensions::new(20, 40));
    }

    #[test]
    fn test_transpose_moves_pixels_across_diagonal() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 0, Rgb([255, 0, 0]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();

        let mut handle = decode(buf.get_ref());
        handle.transpose().unwrap();
        assert_eq!(handle.dimensions(), Dimensions::new(2, 3));

        let decoded = image::load_from_memory(&handle.encode().unwrap())
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.get_pixel(0, 2), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_blur_rejects_nan() {
        let mut handle = decode(&encoded(10, 10, ImageFormat::Png));
        assert!(handle.gaussian_blur(f64::NAN, f64::NAN).is_err());
        assert!(handle.gaussian_blur(2.0, 2.0).is_ok());
    }

    #[test]
    fn test_quality_range() {
        let mut handle = decode(&encoded(10, 10, ImageFormat::Jpeg));
        assert!(handle.set_compression_quality(0).is_err());
        assert!(handle.set_compression_quality(101).is_err());
        assert!(handle.set_compression_quality(40).is_ok());
    }

    fn has_marker(bytes: &[u8], marker: u8) -> bool {
        bytes.windows(2).any(|w| w == [0xFF, marker])
    }

    #[test]
    fn test_encode_keeps_format() {
        let mut handle = decode(&encoded(64, 32, ImageFormat::Jpeg));
        handle.resize(32, 16, ResizeFilter::Lanczos).unwrap();
        let bytes = handle.encode().unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        assert!(has_marker(&bytes, 0xC0));
        let reread = image::load_from_memory(&bytes).unwrap();
        assert_eq!(reread.dimensions(), (32, 16));
    }

    #[test]
    fn test_interlaced_jpeg_is_progressive() {
        let mut handle = decode(&encoded(64, 32, ImageFormat::Jpeg));
        handle.resize(32, 16, ResizeFilter::Lanczos).unwrap();
        handle.set_compression_quality(75).unwrap();
        handle.set_interlaced(true).unwrap();
        let bytes = handle.encode().unwrap();

        assert!(has_marker(&bytes, 0xC2), "expected an SOF2 marker");
        let reread = image::load_from_memory(&bytes).unwrap();
        assert_eq!(reread.dimensions(), (32, 16));
    }

    #[test]
    fn test_oversized_resize_is_rejected() {
        let mut handle = decode(&encoded(40, 20, ImageFormat::Png));
        assert!(handle.resize(u32::MAX, u32::MAX, ResizeFilter::Lanczos).is_err());
        assert!(handle.resize(MAX_DIMENSION + 1, 10, ResizeFilter::Lanczos).is_err());
        assert!(handle.resize(20_000, 20_000, ResizeFilter::Lanczos).is_err());
        assert_eq!(handle.dimensions(), Dimensions::new(40, 20));

        handle.resize(2000, 1000, ResizeFilter::Lanczos).unwrap();
        assert_eq!(handle.dimensions(), Dimensions::new(2000, 1000));
    }
}
