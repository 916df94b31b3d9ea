//! STAC metadata generation for the JRC Global Surface Water archive.
//!
//! Source rasters are classified by their path into one of four dataset
//! groups; the sibling files of the group are read and combined into a STAC
//! Item. Collections are produced from the static dataset registry alone.

pub mod assets;
pub mod catalog;
pub mod classify;
pub mod collection;
pub mod error;
pub mod item;
pub mod raster;
pub mod registry;
pub mod validate;

pub use classify::{classify, Classification, ClassifiedPath};
pub use error::{Error, Result};
pub use item::{build_item, create_item, ItemOptions};
pub use raster::{GdalReader, RasterReader, RasterStats};
pub use registry::{lookup, DatasetGroup};
