//! Error types for the Pearl image gateway.
//!
//! Errors are organized by where they arise: configuration (fatal, startup
//! only), sources (the image could not be fetched), and the codec (a
//! transformation stage failed). `GatewayError` is what a request handler
//! sees and carries the response class for the HTTP layer.

use thiserror::Error;

/// Top-level error type for Pearl operations.
#[derive(Error, Debug)]
pub enum PearlError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Source retrieval errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Codec/transformation errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors. All of these are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A route pattern is not a valid regular expression
    #[error("Invalid pattern for route '{route}': {message}")]
    InvalidPattern { route: String, message: String },

    /// A route pattern lacks the named group that captures the image path
    #[error("No 'image_path' named group in pattern for route '{route}': {pattern}")]
    MissingImagePathGroup { route: String, pattern: String },

    /// A source names a type with no registered constructor
    #[error("Unknown image source type '{kind}' for source '{source_name}'")]
    UnknownSourceType { source_name: String, kind: String },

    /// A route references a source or processor that is not defined
    #[error("Route '{route}' references unknown {kind} '{name}'")]
    UnknownReference {
        route: String,
        kind: &'static str,
        name: String,
    },
}

/// Errors raised while fetching the raw image bytes.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The image does not exist at the source
    #[error("Image not found: {path}")]
    NotFound { path: String },

    /// The source could not be reached or answered unexpectedly
    #[error("Failed to fetch {path}: {message}")]
    Transport { path: String, message: String },

    /// The source body exceeded the configured size limit
    #[error("Image too large: {path} (> {limit} bytes)")]
    TooLarge { path: String, limit: u64 },
}

impl SourceError {
    /// Whether this is the "image does not exist" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound { .. })
    }
}

/// A codec primitive failed. Each variant names the pipeline stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Orientation failed: {0}")]
    Orient(String),

    #[error("Scaling failed: {0}")]
    Scale(String),

    #[error("Cropping failed: {0}")]
    Crop(String),

    #[error("Blurring failed: {0}")]
    Blur(String),

    #[error("Encoding failed: {0}")]
    Encode(String),
}

impl CodecError {
    /// Name of the stage that failed, for logging.
    pub fn stage(&self) -> &'static str {
        match self {
            CodecError::Decode(_) => "decode",
            CodecError::Orient(_) => "orient",
            CodecError::Scale(_) => "scale",
            CodecError::Crop(_) => "crop",
            CodecError::Blur(_) => "blur",
            CodecError::Encode(_) => "encode",
        }
    }
}

/// Errors surfaced to the HTTP layer for a single request.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No configured route matches the request path
    #[error("No route available to handle request: {path}")]
    NoRoute { path: String },

    /// The image could not be retrieved
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A transformation stage failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The request timed out before a response was ready
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The blocking worker running the transformation died
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status class for this error.
    ///
    /// Both source failures map to 404: the caller only learns that the
    /// image is unavailable.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::NoRoute { .. } | GatewayError::Source(_) => 404,
            GatewayError::Timeout { .. } => 504,
            GatewayError::Codec(_) | GatewayError::Internal(_) => 500,
        }
    }
}

/// Convenience type alias for Pearl results.
pub type Result<T> = std::result::Result<T, PearlError>;
