//! Resize planning: from current and requested dimensions to a concrete
//! scale and crop.
//!
//! Everything here is pure. The planner works in four steps:
//!
//! 1. Bail out with an empty plan when nothing was requested or the request
//!    already matches the image.
//! 2. Derive a missing axis from the image's aspect ratio.
//! 3. Clamp the request against the configured maxima, keeping the image's
//!    aspect ratio.
//! 4. Resolve the scale mode into a scale box and, for `AspectCrop`, a crop.
//!
//! Derived axes are rounded half-up: `round(x) = floor(x + 0.5)`.

use crate::types::{Dimensions, ResizePlan, ScaleMode};

/// Upper bound on clamping corrections. A width correction can trigger at
/// most one height correction, and a height correction only ever shrinks
/// the width, so the loop settles after two.
pub const MAX_CLAMP_PASSES: usize = 2;

/// Round half-up for non-negative values, saturating at the `u32` range.
pub fn round_half_up(x: f64) -> u32 {
    (x + 0.5).floor().max(0.0) as u32
}

/// Width that keeps `ratio` at the given height. Never zero.
pub fn aspect_width(ratio: f64, height: u32) -> u32 {
    round_half_up(f64::from(height) * ratio).max(1)
}

/// Height that keeps `ratio` at the given width. Never zero.
pub fn aspect_height(ratio: f64, width: u32) -> u32 {
    round_half_up(f64::from(width) / ratio).max(1)
}

/// Compute the resize plan for one request.
///
/// `maxima` bounds the output on each axis; zero leaves an axis unbounded.
/// An image with a zero axis has no aspect ratio and is never planned.
pub fn plan(
    current: Dimensions,
    requested: Dimensions,
    mode: ScaleMode,
    maxima: Dimensions,
) -> ResizePlan {
    if requested.is_empty() || requested == current {
        return ResizePlan::default();
    }

    let ratio = match current.aspect_ratio() {
        Some(r) if r > 0.0 && r.is_finite() => r,
        _ => return ResizePlan::default(),
    };

    // Deriving the missing axis first lets the clamp see both axes; with
    // both given the order makes no difference.
    let requested = clamp_to_maxima(fill_missing_axis(requested, ratio), ratio, maxima);

    let plan = match mode {
        ScaleMode::Fill => ResizePlan {
            scale: requested,
            crop: Dimensions::default(),
        },
        ScaleMode::AspectFit => ResizePlan {
            scale: aspect_fit(requested, ratio),
            crop: Dimensions::default(),
        },
        ScaleMode::AspectFill => ResizePlan {
            // Covering can overflow the (already clamped) box on one axis;
            // the final output still has to respect the maxima.
            scale: clamp_to_maxima(aspect_fill(requested, ratio), ratio, maxima),
            crop: Dimensions::default(),
        },
        ScaleMode::AspectCrop => ResizePlan {
            scale: aspect_fill(requested, ratio),
            crop: requested,
        },
    };

    tracing::trace!(
        "Planned {} -> {} ({}): scale {}, crop {}",
        current,
        requested,
        mode,
        plan.scale,
        plan.crop
    );
    plan
}

/// Shrink `requested` until it fits `maxima`, re-deriving the other axis
/// from `ratio` after each correction.
pub fn clamp_to_maxima(requested: Dimensions, ratio: f64, maxima: Dimensions) -> Dimensions {
    clamp_counting_passes(requested, ratio, maxima).0
}

/// Clamp and report how many corrections were applied.
fn clamp_counting_passes(
    mut requested: Dimensions,
    ratio: f64,
    maxima: Dimensions,
) -> (Dimensions, usize) {
    let mut passes = 0;
    while passes < MAX_CLAMP_PASSES {
        if maxima.width > 0 && requested.width > maxima.width {
            requested = Dimensions::new(maxima.width, aspect_height(ratio, maxima.width));
        } else if maxima.height > 0 && requested.height > maxima.height {
            requested = Dimensions::new(aspect_width(ratio, maxima.height), maxima.height);
        } else {
            break;
        }
        passes += 1;
    }
    debug_assert!(requested.fits_within(maxima));
    (requested, passes)
}

/// Derive the unspecified axis, if any, from the image's aspect ratio.
fn fill_missing_axis(requested: Dimensions, ratio: f64) -> Dimensions {
    match (requested.width, requested.height) {
        (0, h) => Dimensions::new(aspect_width(ratio, h), h),
        (w, 0) => Dimensions::new(w, aspect_height(ratio, w)),
        _ => requested,
    }
}

/// Contain: the axis giving the smaller result wins.
fn aspect_fit(requested: Dimensions, ratio: f64) -> Dimensions {
    let requested_ratio = requested_ratio(requested);
    if requested_ratio > ratio {
        Dimensions::new(aspect_width(ratio, requested.height), requested.height)
    } else if requested_ratio < ratio {
        Dimensions::new(requested.width, aspect_height(ratio, requested.width))
    } else {
        requested
    }
}

/// Cover: the axis giving the larger result wins.
fn aspect_fill(requested: Dimensions, ratio: f64) -> Dimensions {
    let requested_ratio = requested_ratio(requested);
    if requested_ratio < ratio {
        Dimensions::new(aspect_width(ratio, requested.height), requested.height)
    } else if requested_ratio > ratio {
        Dimensions::new(requested.width, aspect_height(ratio, requested.width))
    } else {
        requested
    }
}

// Both axes are non-zero once `fill_missing_axis` has run.
fn requested_ratio(requested: Dimensions) -> f64 {
    f64::from(requested.width) / f64::from(requested.height)
}
