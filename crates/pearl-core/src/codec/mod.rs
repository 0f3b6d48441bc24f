//! Image codec abstraction.
//!
//! A [`Codec`] decodes bytes into a [`CodecHandle`]: a mutable, decoded
//! image offering the primitive operations the pipeline is built from.
//! Handles are owned by an [`Image`] and released when it is dropped, on
//! every exit path.

pub mod image_rs;

pub use image_rs::ImageRsCodec;

use crate::error::CodecError;
use crate::types::{Dimensions, ProcessedImage};
use thiserror::Error;

/// Failure of a single codec primitive. The pipeline attaches the stage.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct PrimitiveError(pub String);

impl PrimitiveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type PrimitiveResult = std::result::Result<(), PrimitiveError>;

/// Resampling filter for scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    /// Windowed sinc
    #[default]
    Lanczos,
}

/// Clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }
}

/// EXIF orientation tag values (1 through 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    TopLeft = 1,
    TopRight = 2,
    BottomRight = 3,
    BottomLeft = 4,
    LeftTop = 5,
    RightTop = 6,
    RightBottom = 7,
    LeftBottom = 8,
}

impl Orientation {
    /// Map a raw tag value; anything outside 1..=8 is unknown.
    pub fn from_exif(value: u32) -> Option<Self> {
        Some(match value {
            1 => Orientation::TopLeft,
            2 => Orientation::TopRight,
            3 => Orientation::BottomRight,
            4 => Orientation::BottomLeft,
            5 => Orientation::LeftTop,
            6 => Orientation::RightTop,
            7 => Orientation::RightBottom,
            8 => Orientation::LeftBottom,
            _ => return None,
        })
    }

    pub fn exif_value(self) -> u32 {
        self as u32
    }
}

/// A decoded, mutable image.
///
/// All mutating primitives either succeed completely or leave the image
/// unchanged.
pub trait CodecHandle: Send {
    fn dimensions(&self) -> Dimensions;

    /// Lowercase format name of the decoded input, e.g. "jpeg" or "png".
    fn format(&self) -> &str;

    /// The orientation tag, if the image carries one.
    fn orientation(&self) -> Option<Orientation>;

    fn set_orientation(&mut self, orientation: Orientation);

    fn resize(&mut self, width: u32, height: u32, filter: ResizeFilter) -> PrimitiveResult;

    /// Cut a `width` x `height` region whose top left corner is `(x, y)`.
    fn crop(&mut self, width: u32, height: u32, x: u32, y: u32) -> PrimitiveResult;

    fn flip_horizontal(&mut self) -> PrimitiveResult;

    fn flip_vertical(&mut self) -> PrimitiveResult;

    fn rotate(&mut self, rotation: Rotation) -> PrimitiveResult;

    /// Mirror across the top-left to bottom-right diagonal.
    fn transpose(&mut self) -> PrimitiveResult;

    /// Mirror across the top-right to bottom-left diagonal.
    fn transverse(&mut self) -> PrimitiveResult;

    fn gaussian_blur(&mut self, radius_x: f64, radius_y: f64) -> PrimitiveResult;

    /// Output quality for lossy encoders, 1-100.
    fn set_compression_quality(&mut self, quality: u8) -> PrimitiveResult;

    /// Request progressive (interlaced) output where the format allows it.
    /// Backends that cannot honor it encode baseline.
    fn set_interlaced(&mut self, interlaced: bool) -> PrimitiveResult;

    /// Drop metadata (EXIF, color profiles, comments) from the output.
    fn strip_metadata(&mut self) -> PrimitiveResult;

    /// Encode in the input's format.
    fn encode(&self) -> std::result::Result<Vec<u8>, PrimitiveError>;
}

/// Decodes raw bytes into handles. Shared across requests.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> std::result::Result<Box<dyn CodecHandle>, PrimitiveError>;
}

/// A decoded image together with the bytes it came from.
///
/// Owns the codec handle exclusively; dropping the `Image` releases it.
pub struct Image {
    handle: Box<dyn CodecHandle>,
    original: Vec<u8>,
    source_mime: String,
}

impl Image {
    /// Decode `bytes`. `source_mime` is used only when the codec cannot name
    /// the format.
    pub fn decode(
        codec: &dyn Codec,
        bytes: Vec<u8>,
        source_mime: impl Into<String>,
    ) -> Result<Self, CodecError> {
        let handle = codec
            .decode(&bytes)
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Self {
            handle,
            original: bytes,
            source_mime: source_mime.into(),
        })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.handle.dimensions()
    }

    pub fn handle_mut(&mut self) -> &mut dyn CodecHandle {
        self.handle.as_mut()
    }

    /// MIME type derived from the decoded format.
    pub fn mime_type(&self) -> String {
        match self.handle.format() {
            "" | "unknown" => self.source_mime.clone(),
            format => format!("image/{}", format.to_ascii_lowercase()),
        }
    }

    /// Finish the pipeline: encode if anything changed, otherwise hand back
    /// the original bytes untouched.
    pub fn finish(self, modified: bool) -> Result<ProcessedImage, CodecError> {
        let mime_type = self.mime_type();
        let bytes = if modified {
            self.handle
                .encode()
                .map_err(|e| CodecError::Encode(e.to_string()))?
        } else {
            self.original
        };
        Ok(ProcessedImage {
            bytes,
            mime_type,
            modified,
        })
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("format", &self.handle.format())
            .field("dimensions", &self.handle.dimensions())
            .field("original_len", &self.original.len())
            .finish()
    }
}
