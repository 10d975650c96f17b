//! IIIF Image API `info.json` document.
//!
//! Describes an image to IIIF viewers such as OpenSeadragon or Mirador:
//! its full size, the tile size, the power-of-two scale factors the codec can
//! produce by resolution reduction, and the formats and qualities served.
//!
//! # Example Output
//!
//! ```json
//! {
//!   "@context": "http://iiif.io/api/image/2/context.json",
//!   "@id": "http://localhost:3000/iiif/maps%2F1850",
//!   "protocol": "http://iiif.io/api/image",
//!   "width": 1684,
//!   "height": 2338,
//!   "sizes": [{"width": 106, "height": 147}, ...],
//!   "tiles": [{"width": 256, "scaleFactors": [1, 2, 4, 8, 16]}],
//!   "profile": ["http://iiif.io/api/image/2/level2.json", {...}]
//! }
//! ```

use serde::Serialize;
use serde_json::{json, Value};

use crate::format::ImageDescriptor;
use crate::plan::resolver::reduce_dimension;
use crate::request::{OutputFormat, Quality};

pub const IIIF_CONTEXT: &str = "http://iiif.io/api/image/2/context.json";
pub const IIIF_PROTOCOL: &str = "http://iiif.io/api/image";
pub const IIIF_PROFILE: &str = "http://iiif.io/api/image/2/level2.json";

/// One pre-computed size a client can request without resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InfoSize {
    pub width: u32,
    pub height: u32,
}

/// Tiling description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoTiles {
    pub width: u32,
    pub scale_factors: Vec<u32>,
}

/// The `info.json` body.
#[derive(Debug, Clone, Serialize)]
pub struct InfoResponse {
    #[serde(rename = "@context")]
    pub context: &'static str,

    #[serde(rename = "@id")]
    pub id: String,

    pub protocol: &'static str,
    pub width: u32,
    pub height: u32,

    /// Reduced sizes, smallest first
    pub sizes: Vec<InfoSize>,
    pub tiles: Vec<InfoTiles>,
    pub profile: Vec<Value>,
}

/// Build the info document for `descriptor`.
///
/// `base_uri` is the image's URI without a trailing slash; `formats` lists
/// the output types the codec can actually produce.
pub fn build_info(
    descriptor: &ImageDescriptor,
    base_uri: String,
    tile_size: u32,
    formats: &[OutputFormat],
) -> InfoResponse {
    let levels = descriptor.levels();

    let sizes = (0..=levels)
        .rev()
        .map(|r| InfoSize {
            width: reduce_dimension(descriptor.width, r),
            height: reduce_dimension(descriptor.height, r),
        })
        .collect();

    let scale_factors = (0..=levels).map(|r| 1u32 << r.min(31)).collect();

    let extensions: Vec<&str> = formats.iter().map(|f| f.extension()).collect();
    let qualities: Vec<&str> = Quality::ALL.iter().map(|q| q.as_str()).collect();

    InfoResponse {
        context: IIIF_CONTEXT,
        id: base_uri,
        protocol: IIIF_PROTOCOL,
        width: descriptor.width,
        height: descriptor.height,
        sizes,
        tiles: vec![InfoTiles {
            width: tile_size,
            scale_factors,
        }],
        profile: vec![
            Value::from(IIIF_PROFILE),
            json!({
                "formats": extensions,
                "qualities": qualities,
                "supports": ["regionByPx", "regionByPct", "sizeByW", "sizeByH",
                             "sizeByPct", "sizeByWh", "sizeByConfinedWh",
                             "rotationBy90s"],
            }),
        ],
    }
}
