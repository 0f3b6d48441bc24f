//! Image sources: where raw image bytes come from.
//!
//! Each backend implements [`ImageSource`]. Backends are constructed from
//! configuration through a [`SourceRegistry`], which maps a `type` string to
//! a constructor. The registry is assembled once, before any configuration
//! is loaded, and is read-only afterwards.

pub mod filesystem;
pub mod http;
pub mod s3;

pub use filesystem::FileSystemSource;
pub use http::HttpSource;
pub use s3::S3Source;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::error::{ConfigError, SourceError};

/// What to fetch from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOptions {
    /// Image path as captured by the route, e.g. "/photos/cat.jpg"
    pub path: String,
}

impl SourceOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Raw bytes fetched from a source.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub bytes: Vec<u8>,

    /// Best guess at the MIME type; may be "application/octet-stream"
    pub mime_type: String,
}

impl SourceImage {
    /// Wrap bytes, sniffing the MIME type from their content.
    pub fn sniffed(bytes: Vec<u8>) -> Self {
        let mime_type = sniff_mime(&bytes);
        Self { bytes, mime_type }
    }
}

/// Trait that all image sources implement.
///
/// Uses `async_trait` because sources are held as `Arc<dyn ImageSource>`.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Source name from configuration, for logging.
    fn name(&self) -> &str;

    /// Fetch the image at `options.path`.
    async fn get_image(&self, options: &SourceOptions) -> Result<SourceImage, SourceError>;
}

/// Builds a source from its configuration.
pub type SourceConstructor = fn(&SourceConfig) -> Result<Arc<dyn ImageSource>, ConfigError>;

/// Maps source `type` names to constructors.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    constructors: BTreeMap<String, SourceConstructor>,
}

impl SourceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in backends: "filesystem", "http" and "s3".
    pub fn builtin() -> Self {
        Self::new()
            .with(filesystem::KIND, filesystem::construct)
            .with(http::KIND, http::construct)
            .with(s3::KIND, s3::construct)
    }

    /// Register a constructor under `kind`, replacing any previous one.
    pub fn with(mut self, kind: impl Into<String>, constructor: SourceConstructor) -> Self {
        self.constructors.insert(kind.into(), constructor);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Construct the source described by `config`.
    pub fn create(&self, config: &SourceConfig) -> Result<Arc<dyn ImageSource>, ConfigError> {
        let constructor =
            self.constructors
                .get(&config.kind)
                .ok_or_else(|| ConfigError::UnknownSourceType {
                    source_name: config.name.clone(),
                    kind: config.kind.clone(),
                })?;
        tracing::debug!("Creating {} source '{}'", config.kind, config.name);
        constructor(config)
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

/// MIME type from the leading bytes, or "application/octet-stream".
pub fn sniff_mime(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

/// Map an HTTP response status for `path`: 404 is "not found", anything
/// else that is not 200 is a transport failure.
pub(crate) fn check_status(status: reqwest::StatusCode, path: &str) -> Result<(), SourceError> {
    match status {
        reqwest::StatusCode::OK => Ok(()),
        reqwest::StatusCode::NOT_FOUND => Err(SourceError::NotFound {
            path: path.to_string(),
        }),
        other => Err(SourceError::Transport {
            path: path.to_string(),
            message: format!("unexpected status {other}"),
        }),
    }
}

/// Stream a response body into memory, failing once it exceeds `limit`.
pub(crate) async fn read_body(
    response: reqwest::Response,
    path: &str,
    limit: u64,
) -> Result<SourceImage, SourceError> {
    use futures_util::StreamExt;

    let too_large = || SourceError::TooLarge {
        path: path.to_string(),
        limit,
    };
    if response.content_length().is_some_and(|len| len > limit) {
        return Err(too_large());
    }

    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("image/"))
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SourceError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        if bytes.len() as u64 + chunk.len() as u64 > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(match header_mime {
        Some(mime_type) => SourceImage { bytes, mime_type },
        None => SourceImage::sniffed(bytes),
    })
}

/// Turn a reqwest error into a transport failure for `path`.
pub(crate) fn transport_error(path: &str, err: reqwest::Error) -> SourceError {
    SourceError::Transport {
        path: path.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_kinds() {
        let registry = SourceRegistry::builtin();
        assert!(registry.contains("filesystem"));
        assert!(registry.contains("http"));
        assert!(registry.contains("s3"));
        assert!(!registry.contains("ftp"));
        assert_eq!(registry.kinds().count(), 3);
    }

    #[test]
    fn test_create_unknown_kind_fails() {
        let config = SourceConfig {
            name: "archive".into(),
            kind: "ftp".into(),
            ..SourceConfig::default()
        };
        let err = SourceRegistry::builtin().create(&config).err().unwrap();
        assert!(err.to_string().contains("'ftp'"));
        assert!(err.to_string().contains("'archive'"));
    }

    #[test]
    fn test_registry_accepts_custom_kind() {
        fn fixed(config: &SourceConfig) -> Result<Arc<dyn ImageSource>, ConfigError> {
            FileSystemSource::from_config(config).map(|s| Arc::new(s) as Arc<dyn ImageSource>)
        }
        let dir = tempfile::tempdir().unwrap();
        let registry = SourceRegistry::new().with("local-disk", fixed);
        let config = SourceConfig {
            name: "disk".into(),
            kind: "local-disk".into(),
            directory: dir.path().to_string_lossy().into_owned(),
            ..SourceConfig::default()
        };
        let source = registry.create(&config).unwrap();
        assert_eq!(source.name(), "disk");
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(b"\x89PNG\r\n\x1a\n0000"), "image/png");
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_mime(b"hello"), "application/octet-stream");
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(reqwest::StatusCode::OK, "/a").is_ok());
        assert!(check_status(reqwest::StatusCode::NOT_FOUND, "/a")
            .unwrap_err()
            .is_not_found());
        let err = check_status(reqwest::StatusCode::BAD_GATEWAY, "/a").unwrap_err();
        assert!(matches!(err, SourceError::Transport { .. }));
    }
}
