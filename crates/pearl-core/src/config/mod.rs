//! Configuration management for Pearl.
//!
//! Configuration is a TOML file, loaded once at startup and read-only
//! afterwards. Entries named `default` under `[sources]` and `[processors]`
//! supply missing keys to every sibling entry.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::types::ScaleMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the entry whose keys are inherited by its siblings.
pub const DEFAULT_ENTRY: &str = "default";

/// Root configuration structure for Pearl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Image sources by name
    pub sources: BTreeMap<String, SourceConfig>,

    /// Processors by name
    pub processors: BTreeMap<String, ProcessorConfig>,

    /// Routes, matched in order
    pub routes: Vec<RouteConfig>,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut table: toml::Table = content.parse()?;
        inherit_defaults(&mut table, "sources");
        inherit_defaults(&mut table, "processors");

        let mut config: Config = toml::Value::Table(table).try_into()?;
        for (name, source) in config.sources.iter_mut() {
            source.name = name.clone();
        }
        for (name, processor) in config.processors.iter_mut() {
            processor.name = name.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.pearl.pearl/config.toml
    /// - Linux: ~/.config/pearl/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\pearl\config\config.toml
    ///
    /// Falls back to ~/.pearl/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "pearl", "pearl")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".pearl").join("config.toml")
            })
    }

    /// A small working configuration: one filesystem source served under
    /// `/images`. Used by `pearl config init`.
    pub fn example() -> Self {
        let mut sources = BTreeMap::new();
        sources.insert(
            "local".to_string(),
            SourceConfig {
                name: "local".to_string(),
                kind: "filesystem".to_string(),
                directory: "~/.pearl/images".to_string(),
                ..SourceConfig::default()
            },
        );

        let mut processors = BTreeMap::new();
        processors.insert(
            DEFAULT_ENTRY.to_string(),
            ProcessorConfig {
                name: DEFAULT_ENTRY.to_string(),
                default_scale_mode: ScaleMode::AspectFit,
                max_image_width: 2048,
                max_image_height: 2048,
                max_blur_radius_percentage: 0.1,
                auto_orient: true,
                ..ProcessorConfig::default()
            },
        );

        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            sources,
            processors,
            routes: vec![RouteConfig {
                name: "images".to_string(),
                pattern: "^/images(?P<image_path>/.+)$".to_string(),
                source: "local".to_string(),
                processor: DEFAULT_ENTRY.to_string(),
                cache_control: None,
            }],
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Copy keys of `[section.default]` into every sibling entry that lacks them.
fn inherit_defaults(root: &mut toml::Table, section: &str) {
    let Some(toml::Value::Table(entries)) = root.get_mut(section) else {
        return;
    };
    let Some(toml::Value::Table(defaults)) = entries.get(DEFAULT_ENTRY).cloned() else {
        return;
    };

    for (name, entry) in entries.iter_mut() {
        if name == DEFAULT_ENTRY {
            continue;
        }
        if let toml::Value::Table(entry) = entry {
            for (key, value) in &defaults {
                if !entry.contains_key(key) {
                    entry.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
port = 9000

[sources.default]
type = "filesystem"
directory = "/srv/images"

[sources.local]

[sources.origin]
type = "http"
host = "images.example.com"

[processors.default]
image_compression_quality = 70
max_blur_radius_percentage = 0.2

[processors.thumbs]
default_image_width = 200
default_scale_mode = "aspect_fit"
max_image_width = 1000

[processors.thumbs.formats.square]
width = 100
height = 100

[[routes]]
name = "thumbs"
pattern = '^/thumbs(?P<image_path>/.*)$'
source = "local"
processor = "thumbs"
cache_control = "public, max-age=60"

[[routes]]
name = "remote"
pattern = '^/remote(?P<image_path>/.*)$'
source = "origin"
processor = "default"
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].cache_control.as_deref(), Some("public, max-age=60"));
        assert_eq!(config.routes[1].cache_control, None);

        let thumbs = &config.processors["thumbs"];
        assert_eq!(thumbs.name, "thumbs");
        assert_eq!(thumbs.default_scale_mode, ScaleMode::AspectFit);
        assert_eq!(thumbs.formats["square"].dimensions().width, 100);
    }

    #[test]
    fn test_default_entries_are_inherited() {
        let config = Config::from_toml_str(SAMPLE).unwrap();

        let local = &config.sources["local"];
        assert_eq!(local.kind, "filesystem");
        assert_eq!(local.directory, "/srv/images");

        // Explicit keys win over inherited ones.
        let origin = &config.sources["origin"];
        assert_eq!(origin.kind, "http");
        assert_eq!(origin.directory, "/srv/images");

        let thumbs = &config.processors["thumbs"];
        assert_eq!(thumbs.image_compression_quality, 70);
        assert!((thumbs.max_blur_radius_percentage - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_example_config_is_valid_and_round_trips() {
        let example = Config::example();
        let toml = example.to_toml().unwrap();
        assert!(toml.contains("[server]"));
        assert!(toml.contains("[[routes]]"));

        let parsed = Config::from_toml_str(&toml).unwrap();
        assert_eq!(parsed.routes[0].pattern, example.routes[0].pattern);
        assert_eq!(parsed.sources["local"].kind, "filesystem");
    }

    #[test]
    fn test_unparsable_config_is_parse_error() {
        let err = Config::from_toml_str("[server\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let err = Config::load_from(Path::new("/nonexistent/pearl.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.routes[0].name, "thumbs");
    }
}
