//! Deep-zoom tile pyramid planner.
//!
//! Enumerates every tile needed to pre-populate a tile cache for one image.
//!
//! # Levels
//!
//! ```text
//! max_level = ceil(log2(max(width, height)))
//!
//! level 0 ..= 8          one "all" tile, scale 2^level
//! level 9 ..= max_level  raster grid, cell = tile_size * 2^(max_level - level)
//! ```
//!
//! Grid cells are emitted row by row, left to right, with the last row and
//! column clipped to the image. The planner holds no state: planning the same
//! image twice yields the same sequence.

use std::fmt;

use serde::Serialize;

use crate::format::jp2::max_level;
use crate::request::legacy::{PARAM_REGION, PARAM_SCALE};

/// Highest level served as a single whole-image tile.
pub const SINGLE_TILE_MAX_LEVEL: u32 = 8;

/// Default edge length of a deep-zoom tile.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Region of a planned tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileRegion {
    /// The whole image
    All,

    /// Native pixel rectangle
    Pixels { y: u32, x: u32, h: u32, w: u32 },
}

impl fmt::Display for TileRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileRegion::All => f.write_str("all"),
            TileRegion::Pixels { y, x, h, w } => write!(f, "{},{},{},{}", y, x, h, w),
        }
    }
}

/// One tile of the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileQuery {
    /// Deep-zoom level (0 = 1x1)
    pub level: u32,

    /// `2^level`
    pub scale: u64,

    pub region: TileRegion,

    /// Long side of the rendered tile in pixels
    pub output_long_side: u32,
}

impl TileQuery {
    /// `"y,x,h,w"` or `"all"`.
    pub fn region_string(&self) -> String {
        self.region.to_string()
    }

    /// Legacy query string that renders this tile.
    pub fn to_query_string(&self) -> String {
        format!(
            "{}={}&{}={}",
            PARAM_REGION, self.region, PARAM_SCALE, self.output_long_side
        )
    }
}

/// Plan every tile of the pyramid, levels ascending.
pub fn plan(width: u32, height: u32, tile_size: u32) -> Vec<TileQuery> {
    tiles(width, height, tile_size).collect()
}

/// Lazily enumerate the pyramid, one level at a time.
pub fn tiles(width: u32, height: u32, tile_size: u32) -> impl Iterator<Item = TileQuery> {
    let tile_size = tile_size.max(1);
    let top = max_level(width, height);
    (0..=top).flat_map(move |level| level_tiles(width, height, tile_size, top, level))
}

/// Tiles of a single level.
pub fn level_tiles(
    width: u32,
    height: u32,
    tile_size: u32,
    max_level: u32,
    level: u32,
) -> Vec<TileQuery> {
    let scale = 1u64 << level.min(63);
    let long_side = width.max(height);

    if level <= SINGLE_TILE_MAX_LEVEL {
        return vec![TileQuery {
            level,
            scale,
            region: TileRegion::All,
            output_long_side: scale.min(u64::from(long_side)).max(1) as u32,
        }];
    }

    let multiplier = 1u64 << max_level.saturating_sub(level).min(63);
    let step = multiplier.saturating_mul(u64::from(tile_size.max(1)));
    let (width, height) = (u64::from(width), u64::from(height));

    let mut out = Vec::new();
    let mut y = 0u64;
    while y < height {
        let h = step.min(height - y);
        let mut x = 0u64;
        while x < width {
            let w = step.min(width - x);
            out.push(TileQuery {
                level,
                scale,
                region: TileRegion::Pixels {
                    y: y as u32,
                    x: x as u32,
                    h: h as u32,
                    w: w as u32,
                },
                output_long_side: h.max(w).div_ceil(multiplier).max(1) as u32,
            });
            x += step;
        }
        y += step;
    }
    out
}
