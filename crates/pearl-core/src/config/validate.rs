//! Configuration validation: range checks and cross-references.

use crate::error::ConfigError;
use crate::route::compile_pattern;
use crate::source::SourceRegistry;

use super::{Config, DEFAULT_ENTRY};

impl Config {
    /// Validate ranges, route patterns, and that every route references a
    /// defined source and processor.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be > 0".into(),
            ));
        }
        if self.server.read_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "server.read_timeout_secs must be > 0".into(),
            ));
        }
        if self.server.write_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "server.write_timeout_secs must be > 0".into(),
            ));
        }

        for (name, processor) in &self.processors {
            if !(1..=100).contains(&processor.image_compression_quality) {
                return Err(ConfigError::ValidationError(format!(
                    "processors.{name}.image_compression_quality must be between 1 and 100"
                )));
            }
            let blur = processor.max_blur_radius_percentage;
            if blur.is_nan() || blur < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "processors.{name}.max_blur_radius_percentage must be >= 0"
                )));
            }
        }

        if self.routes.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[routes]] entry is required".into(),
            ));
        }

        for route in &self.routes {
            compile_pattern(&route.name, &route.pattern)?;

            if !self.sources.contains_key(&route.source) {
                return Err(ConfigError::UnknownReference {
                    route: route.name.clone(),
                    kind: "source",
                    name: route.source.clone(),
                });
            }
            if !self.processors.contains_key(&route.processor) {
                return Err(ConfigError::UnknownReference {
                    route: route.name.clone(),
                    kind: "processor",
                    name: route.processor.clone(),
                });
            }
        }
        Ok(())
    }

    /// Check that every source a route uses names a registered type.
    ///
    /// The `default` source is exempt unless a route references it: it
    /// usually only carries keys for its siblings to inherit.
    pub fn check_source_types(&self, registry: &SourceRegistry) -> Result<(), ConfigError> {
        for (name, source) in &self.sources {
            let referenced = self.routes.iter().any(|r| &r.source == name);
            if name == DEFAULT_ENTRY && !referenced {
                continue;
            }
            if !registry.contains(&source.kind) {
                return Err(ConfigError::UnknownSourceType {
                    source_name: name.clone(),
                    kind: source.kind.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProcessorConfig, RouteConfig, SourceConfig};

    fn valid_config() -> Config {
        Config::example()
    }

    #[test]
    fn test_example_config_passes_validation() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert!(config
            .check_source_types(&SourceRegistry::builtin())
            .is_ok());
    }

    #[test]
    fn test_default_config_fails_without_routes() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("routes"));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = valid_config();
        config.server.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = valid_config();
        config.server.read_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("read_timeout_secs"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_quality() {
        let mut config = valid_config();
        config.processors.insert(
            "lossy".into(),
            ProcessorConfig {
                image_compression_quality: 0,
                ..ProcessorConfig::default()
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("image_compression_quality"));
    }

    #[test]
    fn test_validate_rejects_negative_blur_percentage() {
        let mut config = valid_config();
        if let Some(p) = config.processors.get_mut("default") {
            p.max_blur_radius_percentage = -0.5;
        }
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_blur_radius_percentage"));
    }

    #[test]
    fn test_validate_rejects_pattern_without_image_path() {
        let mut config = valid_config();
        config.routes[0].pattern = "^/images/(.+)$".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingImagePathGroup { .. }));
    }

    #[test]
    fn test_validate_rejects_invalid_regex() {
        let mut config = valid_config();
        config.routes[0].pattern = "^/images(?P<image_path>/.+$".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_validate_rejects_unknown_references() {
        let mut config = valid_config();
        config.routes.push(RouteConfig {
            name: "broken".into(),
            pattern: "^/b(?P<image_path>/.+)$".into(),
            source: "missing".into(),
            processor: "default".into(),
            cache_control: None,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown source 'missing'"));

        config.routes[1].source = "local".into();
        config.routes[1].processor = "nope".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown processor 'nope'"));
    }

    #[test]
    fn test_unregistered_source_type_is_rejected() {
        let mut config = valid_config();
        config.sources.insert(
            "ftp".into(),
            SourceConfig {
                kind: "ftp".into(),
                ..SourceConfig::default()
            },
        );
        let err = config
            .check_source_types(&SourceRegistry::builtin())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSourceType { .. }));
    }

    #[test]
    fn test_unreferenced_default_source_needs_no_type() {
        let mut config = valid_config();
        config.sources.insert(
            DEFAULT_ENTRY.into(),
            SourceConfig {
                directory: "/srv".into(),
                ..SourceConfig::default()
            },
        );
        assert!(config
            .check_source_types(&SourceRegistry::builtin())
            .is_ok());
    }
}
