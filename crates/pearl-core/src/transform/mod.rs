//! The transformation pipeline.
//!
//! - `geometry`: pure resize planning
//! - `orientation`: EXIF orientation normalization
//! - `processor`: runs the steps against a codec handle

pub mod geometry;
pub mod orientation;
pub mod processor;

pub use geometry::plan;
pub use orientation::normalize;
pub use processor::ImageProcessor;
