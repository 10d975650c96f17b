//! Request planning.
//!
//! - [`resolver`]: one request against one image becomes an [`ExtractionPlan`]
//! - [`pyramid`]: one image becomes the full set of deep-zoom [`TileQuery`]s

pub mod pyramid;
pub mod resolver;

pub use pyramid::{plan, tiles, TileQuery, TileRegion, DEFAULT_TILE_SIZE};
pub use resolver::{resolve, ExtractionPlan, RegionFraction};
