//! The request path: route, fetch, transform, respond.
//!
//! A [`Gateway`] is built once from configuration and then shared
//! read-only across requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::codec::{Codec, ImageRsCodec};
use crate::config::Config;
use crate::error::{ConfigError, GatewayError, SourceError};
use crate::route::{Dispatcher, Route};
use crate::source::SourceRegistry;
use crate::transform::ImageProcessor;
use crate::types::ProcessedImage;

/// Cache-Control sent when the route does not override it.
pub const DEFAULT_CACHE_CONTROL: &str = "no-transform,public,max-age=86400,s-maxage=2592000";

/// A successfully served image.
#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub image: ProcessedImage,
    pub cache_control: String,
    /// Name of the route that served the request
    pub route: String,
}

pub struct Gateway {
    dispatcher: Dispatcher,
    codec: Arc<dyn Codec>,
    fetch_timeout: Duration,
}

impl Gateway {
    /// Build routes, sources and processors from `config`, decoding with the
    /// `image` crate backend.
    pub fn from_config(config: &Config, registry: &SourceRegistry) -> Result<Self, ConfigError> {
        Self::with_codec(config, registry, Arc::new(ImageRsCodec::new()))
    }

    pub fn with_codec(
        config: &Config,
        registry: &SourceRegistry,
        codec: Arc<dyn Codec>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        config.check_source_types(registry)?;

        // Routes sharing a source share one instance of it.
        let mut sources = std::collections::BTreeMap::new();
        let mut routes = Vec::with_capacity(config.routes.len());

        for route in &config.routes {
            let source_config = config.sources.get(&route.source).ok_or_else(|| {
                ConfigError::UnknownReference {
                    route: route.name.clone(),
                    kind: "source",
                    name: route.source.clone(),
                }
            })?;
            let processor_config = config.processors.get(&route.processor).ok_or_else(|| {
                ConfigError::UnknownReference {
                    route: route.name.clone(),
                    kind: "processor",
                    name: route.processor.clone(),
                }
            })?;

            let source = match sources.get(&route.source) {
                Some(source) => Arc::clone(source),
                None => {
                    let source = registry.create(source_config)?;
                    sources.insert(route.source.clone(), Arc::clone(&source));
                    source
                }
            };

            routes.push(Route::new(
                &route.name,
                &route.pattern,
                source,
                ImageProcessor::new(processor_config.clone()),
                route.cache_control.clone(),
            )?);
            tracing::debug!(
                "Route '{}': {} -> source '{}', processor '{}'",
                route.name,
                route.pattern,
                route.source,
                route.processor
            );
        }

        tracing::info!(
            "Gateway ready with {} route(s) using the {} codec",
            routes.len(),
            codec.name()
        );
        Ok(Self::new(
            Dispatcher::new(routes),
            codec,
            Duration::from_secs(config.server.read_timeout_secs),
        ))
    }

    pub fn new(dispatcher: Dispatcher, codec: Arc<dyn Codec>, fetch_timeout: Duration) -> Self {
        Self {
            dispatcher,
            codec,
            fetch_timeout,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serve one request.
    ///
    /// `query` is the raw query string without the leading `?`.
    pub async fn serve(&self, path: &str, query: &str) -> Result<ImageResponse, GatewayError> {
        let start = Instant::now();
        let dispatch = self.dispatcher.dispatch(path, query).ok_or_else(|| {
            tracing::debug!("No route for {}", path);
            GatewayError::NoRoute {
                path: path.to_string(),
            }
        })?;
        let route = dispatch.route;
        let source_path = dispatch.source_options.path.clone();

        tracing::info!(
            route = route.name(),
            "Handling request for image {} with dimensions {}",
            source_path,
            dispatch.request.dimensions
        );

        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            route.source().get_image(&dispatch.source_options),
        )
        .await
        .unwrap_or_else(|_| {
            Err(SourceError::Transport {
                path: source_path.clone(),
                message: format!("timed out after {:?}", self.fetch_timeout),
            })
        });
        let source_image = fetched.map_err(|e| {
            tracing::warn!(route = route.name(), "Failed to retrieve image: {}", e);
            e
        })?;

        let codec = Arc::clone(&self.codec);
        let processor = route.processor().clone();
        let request = dispatch.request;
        let processed = tokio::task::spawn_blocking(move || {
            processor.process(
                codec.as_ref(),
                source_image.bytes,
                &source_image.mime_type,
                &request,
            )
        })
        .await
        .map_err(|e| GatewayError::Internal(format!("Task join error: {e}")))?
        .map_err(|e| {
            tracing::warn!(
                route = route.name(),
                stage = e.stage(),
                "Failed to process image {}: {}",
                source_path,
                e
            );
            e
        })?;

        tracing::debug!(
            "Served {} ({} bytes, {}) in {:?}",
            source_path,
            processed.bytes.len(),
            processed.mime_type,
            start.elapsed()
        );

        Ok(ImageResponse {
            image: processed,
            cache_control: route
                .cache_control()
                .unwrap_or(DEFAULT_CACHE_CONTROL)
                .to_string(),
            route: route.name().to_string(),
        })
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("routes", &self.dispatcher.routes())
            .field("codec", &self.codec.name())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}
