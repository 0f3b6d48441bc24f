//! EXIF orientation normalization.

use crate::codec::{CodecHandle, Orientation, PrimitiveResult, Rotation};
use crate::error::CodecError;

/// The pixel operation that undoes an orientation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    FlipHorizontal,
    FlipVertical,
    Rotate(Rotation),
    Transpose,
    Transverse,
}

impl Correction {
    /// `None` for `TopLeft`, which is already upright.
    pub fn for_orientation(orientation: Orientation) -> Option<Self> {
        match orientation {
            Orientation::TopLeft => None,
            Orientation::TopRight => Some(Correction::FlipHorizontal),
            Orientation::BottomRight => Some(Correction::Rotate(Rotation::Half)),
            Orientation::BottomLeft => Some(Correction::FlipVertical),
            Orientation::LeftTop => Some(Correction::Transpose),
            Orientation::RightTop => Some(Correction::Rotate(Rotation::Quarter)),
            Orientation::RightBottom => Some(Correction::Transverse),
            Orientation::LeftBottom => Some(Correction::Rotate(Rotation::ThreeQuarter)),
        }
    }

    fn apply(self, handle: &mut dyn CodecHandle) -> PrimitiveResult {
        match self {
            Correction::FlipHorizontal => handle.flip_horizontal(),
            Correction::FlipVertical => handle.flip_vertical(),
            Correction::Rotate(rotation) => handle.rotate(rotation),
            Correction::Transpose => handle.transpose(),
            Correction::Transverse => handle.transverse(),
        }
    }
}

/// Rotate and flip the image upright and reset its tag to `TopLeft`.
///
/// Returns whether the pixels changed. An untagged or upright image is left
/// alone. On failure the tag is not reset.
pub fn normalize(handle: &mut dyn CodecHandle) -> Result<bool, CodecError> {
    let Some(orientation) = handle.orientation() else {
        return Ok(false);
    };
    let Some(correction) = Correction::for_orientation(orientation) else {
        return Ok(false);
    };

    correction
        .apply(handle)
        .map_err(|e| CodecError::Orient(e.to_string()))?;
    handle.set_orientation(Orientation::TopLeft);

    tracing::debug!(tag = orientation.exif_value(), ?correction, "Normalized orientation");
    Ok(true)
}
