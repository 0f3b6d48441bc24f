//! Sub-configuration structs with their defaults.

use crate::types::{Dimensions, ScaleMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Upper bound on fetching an image from its source, in seconds
    pub read_timeout_secs: u64,

    /// Upper bound on producing the whole response, in seconds
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout_secs: 5,
            write_timeout_secs: 30,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Where and how a source fetches raw image bytes.
///
/// Only the keys relevant to `type` are read; the rest stay empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source name, filled in from the table key
    #[serde(skip)]
    pub name: String,

    /// Backend type: "filesystem", "http" or "s3"
    #[serde(rename = "type")]
    pub kind: String,

    /// Filesystem root, or path prefix for HTTP sources
    pub directory: String,

    /// Origin host for HTTP sources (scheme optional, defaults to http)
    pub host: String,

    /// S3 bucket name
    pub s3_bucket: String,

    /// S3 region
    pub s3_region: String,

    /// S3 access key (supports ${ENV_VAR} syntax)
    pub s3_access_key: String,

    /// S3 secret key (supports ${ENV_VAR} syntax)
    pub s3_secret_key: String,

    /// Largest source body accepted, in bytes
    pub max_source_bytes: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: String::new(),
            directory: String::new(),
            host: String::new(),
            s3_bucket: String::new(),
            s3_region: "us-east-1".to_string(),
            s3_access_key: String::new(),
            s3_secret_key: String::new(),
            max_source_bytes: 50 * 1024 * 1024,
        }
    }
}

/// A named preset selected with the `format` query parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub width: u32,
    pub height: u32,
    pub blur: f64,
}

impl FormatConfig {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Per-route transformation settings. Read-only once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Processor name, filled in from the table key
    #[serde(skip)]
    pub name: String,

    /// JPEG quality applied when a scaled image is re-encoded (1-100)
    pub image_compression_quality: u8,

    /// Scale mode used when the request names none (or an unknown one)
    pub default_scale_mode: ScaleMode,

    /// Dimensions used when the request names none
    pub default_image_width: u32,
    pub default_image_height: u32,

    /// Output bounds; zero leaves an axis unbounded
    pub max_image_width: u32,
    pub max_image_height: u32,

    /// Blur radius per unit of blur fraction, relative to image width
    pub max_blur_radius_percentage: f64,

    /// Normalize EXIF orientation before any other step
    pub auto_orient: bool,

    /// Named presets
    pub formats: BTreeMap<String, FormatConfig>,

    /// Deprecated: `true` forces `default_scale_mode = "aspect_fit"`
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub maintain_aspect_ratio: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            image_compression_quality: 85,
            default_scale_mode: ScaleMode::Fill,
            default_image_width: 0,
            default_image_height: 0,
            max_image_width: 0,
            max_image_height: 0,
            max_blur_radius_percentage: 0.0,
            auto_orient: false,
            formats: BTreeMap::new(),
            maintain_aspect_ratio: false,
        }
    }
}

impl ProcessorConfig {
    pub fn default_dimensions(&self) -> Dimensions {
        Dimensions::new(self.default_image_width, self.default_image_height)
    }

    pub fn max_dimensions(&self) -> Dimensions {
        Dimensions::new(self.max_image_width, self.max_image_height)
    }

    /// Scale mode after applying the deprecated `maintain_aspect_ratio` flag.
    pub fn effective_scale_mode(&self) -> ScaleMode {
        if self.maintain_aspect_ratio {
            ScaleMode::AspectFit
        } else {
            self.default_scale_mode
        }
    }
}

/// Maps a URL path pattern to a source and a processor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Route name, used in logs
    pub name: String,

    /// Regular expression with an `image_path` named group. Optional
    /// `width`, `height` and `image_ext` groups are honored too.
    pub pattern: String,

    /// Key into `[sources]`
    pub source: String,

    /// Key into `[processors]`
    pub processor: String,

    /// Cache-Control override for this route's responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}
