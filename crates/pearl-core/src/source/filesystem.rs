//! Images read from a local directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{ImageSource, SourceImage, SourceOptions};
use crate::config::SourceConfig;
use crate::error::{ConfigError, SourceError};

pub const KIND: &str = "filesystem";

pub(super) fn construct(config: &SourceConfig) -> Result<Arc<dyn ImageSource>, ConfigError> {
    Ok(Arc::new(FileSystemSource::from_config(config)?))
}

/// Serves files from a flat directory.
///
/// The request path maps to a single file name: leading separators are
/// trimmed and the remaining `/` become `_`, so `/a/b.jpg` reads `a_b.jpg`.
#[derive(Debug)]
pub struct FileSystemSource {
    name: String,
    root: PathBuf,
}

impl FileSystemSource {
    /// Open the configured directory, creating it if missing.
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        if config.directory.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "sources.{}.directory is required for filesystem sources",
                config.name
            )));
        }
        let root = PathBuf::from(shellexpand::tilde(&config.directory).into_owned());
        Self::new(&config.name, root)
    }

    pub fn new(name: &str, root: PathBuf) -> Result<Self, ConfigError> {
        if !root.exists() {
            tracing::info!("Creating image directory {:?}", root);
            std::fs::create_dir_all(&root).map_err(|e| {
                ConfigError::ValidationError(format!(
                    "source '{name}': cannot create {root:?}: {e}"
                ))
            })?;
        }
        if !root.is_dir() {
            return Err(ConfigError::ValidationError(format!(
                "source '{name}': {root:?} is not a directory"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name for a request path, or `None` when it names nothing.
    pub fn file_name_for(path: &str) -> Option<String> {
        let name = path.trim_start_matches(['/', '\\']).replace(['/', '\\'], "_");
        match name.as_str() {
            "" | "." | ".." => None,
            _ => Some(name),
        }
    }
}

#[async_trait]
impl ImageSource for FileSystemSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_image(&self, options: &SourceOptions) -> Result<SourceImage, SourceError> {
        let not_found = || SourceError::NotFound {
            path: options.path.clone(),
        };
        let file_name = Self::file_name_for(&options.path).ok_or_else(not_found)?;
        let full_path = self.root.join(file_name);
        tracing::debug!("Reading {:?}", full_path);

        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(SourceImage::sniffed(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(SourceError::Transport {
                path: options.path.clone(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_flattening() {
        assert_eq!(FileSystemSource::file_name_for("/cat.jpg").as_deref(), Some("cat.jpg"));
        assert_eq!(
            FileSystemSource::file_name_for("//photos/2024/cat.jpg").as_deref(),
            Some("photos_2024_cat.jpg")
        );
        assert_eq!(
            FileSystemSource::file_name_for("/../etc/passwd").as_deref(),
            Some(".._etc_passwd")
        );
        assert_eq!(FileSystemSource::file_name_for("/"), None);
        assert_eq!(FileSystemSource::file_name_for("/.."), None);
    }

    #[test]
    fn test_missing_root_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("images");
        let source = FileSystemSource::new("local", root.clone()).unwrap();
        assert!(root.is_dir());
        assert_eq!(source.root(), root);
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(FileSystemSource::new("local", file).is_err());
    }

    #[test]
    fn test_directory_required() {
        let config = SourceConfig {
            name: "local".into(),
            kind: KIND.into(),
            ..SourceConfig::default()
        };
        assert!(FileSystemSource::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_get_image_reads_flattened_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_b.png"), b"\x89PNG\r\n\x1a\nrest").unwrap();
        let source = FileSystemSource::new("local", dir.path().to_path_buf()).unwrap();

        let image = source.get_image(&SourceOptions::new("/a/b.png")).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert!(image.bytes.ends_with(b"rest"));
    }

    #[tokio::test]
    async fn test_get_image_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSystemSource::new("local", dir.path().to_path_buf()).unwrap();
        let err = source
            .get_image(&SourceOptions::new("/missing.jpg"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
