//! Pearl Core - on-the-fly image transformation gateway library.
//!
//! Pearl maps request paths to routes. Each route names a source (where the
//! original image lives) and a processor (how to resize, crop and blur it):
//!
//! ```text
//! Path → Route → Source fetch → Decode → Orient → Scale → Crop → Blur → Encode
//! ```
//!
//! The HTTP server lives in the `pearl` binary; this crate is the pipeline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pearl_core::{Config, Gateway, SourceRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let gateway = Gateway::from_config(&config, &SourceRegistry::builtin())?;
//!
//!     let response = gateway.serve("/images/cat.jpg", "w=200&h=200").await?;
//!     println!("{} bytes of {}", response.image.bytes.len(), response.image.mime_type);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod codec;
pub mod config;
pub mod error;
pub mod gateway;
pub mod route;
pub mod source;
pub mod transform;
pub mod types;

// Re-exports for convenient access
pub use codec::{Codec, CodecHandle, Image, ImageRsCodec};
pub use config::{Config, ProcessorConfig};
pub use error::{CodecError, ConfigError, GatewayError, PearlError, Result, SourceError};
pub use gateway::{Gateway, ImageResponse, DEFAULT_CACHE_CONTROL};
pub use route::{Dispatcher, Route};
pub use source::{ImageSource, SourceImage, SourceOptions, SourceRegistry};
pub use transform::ImageProcessor;
pub use types::{Dimensions, Focalpoint, ProcessedImage, ResizePlan, ScaleMode, TransformRequest};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
