//! Images fetched from an HTTP origin.

use std::sync::Arc;

use async_trait::async_trait;

use super::{check_status, read_body, transport_error, ImageSource, SourceImage, SourceOptions};
use crate::config::SourceConfig;
use crate::error::{ConfigError, SourceError};

pub const KIND: &str = "http";

pub(super) fn construct(config: &SourceConfig) -> Result<Arc<dyn ImageSource>, ConfigError> {
    Ok(Arc::new(HttpSource::from_config(config)?))
}

/// Fetches `{host}{directory}{path}` with a GET request.
pub struct HttpSource {
    name: String,
    base_url: String,
    directory: String,
    max_bytes: u64,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        let host = config.host.trim_end_matches('/');
        if host.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "sources.{}.host is required for http sources",
                config.name
            )));
        }
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };

        Ok(Self {
            name: config.name.clone(),
            base_url,
            directory: config.directory.trim_end_matches('/').to_string(),
            max_bytes: config.max_source_bytes,
            client: reqwest::Client::new(),
        })
    }

    /// Full URL for a request path. Each path component is escaped.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url,
            escape_path(&self.directory),
            escape_path(path)
        )
    }
}

/// Escape every `/`-separated component, keeping the separators.
fn escape_path(path: &str) -> String {
    path.split('/')
        .map(|part| form_urlencoded::byte_serialize(part.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ImageSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_image(&self, options: &SourceOptions) -> Result<SourceImage, SourceError> {
        let url = self.url_for(&options.path);
        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&options.path, e))?;
        check_status(response.status(), &options.path)?;
        read_body(response, &options.path, self.max_bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(host: &str, directory: &str) -> HttpSource {
        HttpSource::from_config(&SourceConfig {
            name: "origin".into(),
            kind: KIND.into(),
            host: host.into(),
            directory: directory.into(),
            ..SourceConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_defaults_to_http() {
        let s = source("images.example.com", "/assets");
        assert_eq!(s.url_for("/cat.jpg"), "http://images.example.com/assets/cat.jpg");
    }

    #[test]
    fn test_url_keeps_explicit_scheme() {
        let s = source("https://cdn.example.com/", "");
        assert_eq!(s.url_for("/a/b.png"), "https://cdn.example.com/a/b.png");
    }

    #[test]
    fn test_url_escapes_components() {
        let s = source("example.com", "");
        assert_eq!(
            s.url_for("/my photos/caf\u{e9}?.jpg"),
            "http://example.com/my+photos/caf%C3%A9%3F.jpg"
        );
    }

    #[test]
    fn test_host_required() {
        let config = SourceConfig {
            name: "origin".into(),
            kind: KIND.into(),
            ..SourceConfig::default()
        };
        assert!(HttpSource::from_config(&config).is_err());
    }
}
