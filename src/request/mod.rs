//! Client request parsing.
//!
//! Two surface syntaxes feed the same [`DecodeRequest`]:
//!
//! - [`legacy`]: `svc.region` / `svc.scale` / `svc.level` ... query parameters
//! - [`iiif`]: `{identifier}/{region}/{size}/{rotation}/{quality}.{format}` paths
//!
//! Both parsers fail fast on malformed input; nothing malformed is replaced
//! by a default.

pub mod iiif;
pub mod legacy;
pub mod types;

pub use iiif::{parse_path, parse_segments, IiifRequest, Region, Size};
pub use legacy::{parse_legacy, LegacyParams};
pub use types::{DecodeRequest, OutputFormat, Quality, RegionSpec, Rotation, SizeSpec};
