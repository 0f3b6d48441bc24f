//! Core data types for the Pearl transformation pipeline.
//!
//! These are plain value types: built per request (or once at startup for
//! configuration) and never shared mutably.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height in pixels. `(0, 0)` means "unspecified".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True for the zero value.
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// Width over height, or `None` when the height is zero.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.height == 0 {
            None
        } else {
            Some(f64::from(self.width) / f64::from(self.height))
        }
    }

    /// True when neither axis exceeds the corresponding maximum.
    /// A zero maximum leaves that axis unbounded.
    pub fn fits_within(&self, maxima: Dimensions) -> bool {
        (maxima.width == 0 || self.width <= maxima.width)
            && (maxima.height == 0 || self.height <= maxima.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Location of the image subject, normalized to `[0, 1]` on each axis.
/// `(0, 0)` is the top left, `(1, 1)` the bottom right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Focalpoint {
    pub x: f64,
    pub y: f64,
}

impl Focalpoint {
    pub const CENTER: Focalpoint = Focalpoint { x: 0.5, y: 0.5 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Parse an `"X,Y"` pair such as `"0.1,0.9"`.
    ///
    /// Anything else, including a pair with a non-numeric half, yields the
    /// center.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.split(',');
        let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
            return Self::CENTER;
        };
        match (x.trim().parse::<f64>(), y.trim().parse::<f64>()) {
            (Ok(x), Ok(y)) if x.is_finite() && y.is_finite() => Self { x, y },
            _ => Self::CENTER,
        }
    }

    /// Clamp both coordinates into `[0, 1]`.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

impl Default for Focalpoint {
    fn default() -> Self {
        Self::CENTER
    }
}

/// How requested dimensions interact with the image's natural aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Scale to exactly the requested box, distorting if needed.
    Fill,
    /// Fit entirely inside the requested box.
    AspectFit,
    /// Cover the requested box without cropping; may overflow one axis.
    AspectFill,
    /// Cover the requested box, then crop to it exactly.
    AspectCrop,
}

impl ScaleMode {
    pub const ALL: [ScaleMode; 4] = [
        ScaleMode::Fill,
        ScaleMode::AspectFit,
        ScaleMode::AspectFill,
        ScaleMode::AspectCrop,
    ];

    /// Look up a mode by its wire name. Case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fill" => Some(ScaleMode::Fill),
            "aspect_fit" => Some(ScaleMode::AspectFit),
            "aspect_fill" => Some(ScaleMode::AspectFill),
            "aspect_crop" => Some(ScaleMode::AspectCrop),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScaleMode::Fill => "fill",
            ScaleMode::AspectFit => "aspect_fit",
            ScaleMode::AspectFill => "aspect_fill",
            ScaleMode::AspectCrop => "aspect_crop",
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-request transformation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    /// Requested output box; zero value means "use the processor default"
    pub dimensions: Dimensions,

    /// Blur strength in `[0, 1]`; zero disables blurring
    pub blur_fraction: f64,

    /// Scale mode override; `None` uses the processor default
    pub scale_mode: Option<ScaleMode>,

    /// Subject location used to position crops
    pub focalpoint: Focalpoint,
}

impl Default for TransformRequest {
    fn default() -> Self {
        Self {
            dimensions: Dimensions::default(),
            blur_fraction: 0.0,
            scale_mode: None,
            focalpoint: Focalpoint::CENTER,
        }
    }
}

/// Concrete geometry for one request. An empty field means "skip this step".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizePlan {
    pub scale: Dimensions,
    pub crop: Dimensions,
}

impl ResizePlan {
    pub fn is_empty(&self) -> bool {
        self.scale.is_empty() && self.crop.is_empty()
    }
}

/// The result of running a request through the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Encoded output, or the untouched input bytes when nothing changed
    pub bytes: Vec<u8>,

    /// MIME type of `bytes` (e.g. "image/jpeg")
    pub mime_type: String,

    /// Whether any transformation step modified the image
    pub modified: bool,
}
