//! Per-request options from the query string and path captures.

use crate::config::ProcessorConfig;
use crate::types::{Dimensions, Focalpoint, ScaleMode, TransformRequest};

/// Options parsed from a query string. Unparsable values read as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// `w`
    pub width: u32,
    /// `h`
    pub height: u32,
    /// `blur`, clamped to `[0, 1]`
    pub blur: f64,
    /// `focalpoint`, as "X,Y"
    pub focalpoint: Option<Focalpoint>,
    /// `scale_mode`; unknown names read as `None`
    pub scale_mode: Option<ScaleMode>,
    /// `format` preset name
    pub format: Option<String>,
}

impl QueryOptions {
    /// Parse a raw (still percent-encoded) query string. For repeated keys
    /// the first occurrence wins.
    pub fn parse(query: &str) -> Self {
        let mut options = Self::default();
        let mut seen: Vec<String> = Vec::new();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if seen.iter().any(|k| *k == key) {
                continue;
            }
            seen.push(key.to_string());

            match key.as_ref() {
                "w" => options.width = parse_dimension(&value),
                "h" => options.height = parse_dimension(&value),
                "blur" => options.blur = parse_blur(&value),
                "focalpoint" => options.focalpoint = Some(Focalpoint::parse(&value)),
                "scale_mode" => options.scale_mode = ScaleMode::from_name(&value),
                "format" if !value.is_empty() => options.format = Some(value.into_owned()),
                _ => {}
            }
        }
        options
    }

    /// Combine with path captures and the processor's format presets.
    ///
    /// Query dimensions win over path dimensions, which win over a preset.
    /// The processor's own defaults are applied later, by the processor.
    pub fn into_request(
        self,
        path_dimensions: Dimensions,
        processor: &ProcessorConfig,
    ) -> TransformRequest {
        let mut dimensions = Dimensions::new(
            if self.width > 0 { self.width } else { path_dimensions.width },
            if self.height > 0 { self.height } else { path_dimensions.height },
        );
        let mut blur_fraction = self.blur;

        if let Some(preset) = self.format.as_deref().and_then(|f| processor.formats.get(f)) {
            if dimensions.is_empty() {
                dimensions = preset.dimensions();
            }
            if blur_fraction == 0.0 {
                blur_fraction = parse_blur_value(preset.blur);
            }
        }

        TransformRequest {
            dimensions,
            blur_fraction,
            scale_mode: self.scale_mode,
            focalpoint: self.focalpoint.unwrap_or_default().clamped(),
        }
    }
}

/// Decimal `u32`; anything else is zero.
pub fn parse_dimension(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

/// Decimal fraction clamped to `[0, 1]`; anything else is zero.
pub fn parse_blur(value: &str) -> f64 {
    parse_blur_value(value.trim().parse().unwrap_or(0.0))
}

fn parse_blur_value(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
