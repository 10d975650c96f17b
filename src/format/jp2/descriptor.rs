//! Image descriptor produced by the JP2 metadata extractor.

use serde::Serialize;

use crate::format::detect::SourceFormat;

/// Smallest long-side size (in pixels) the server is willing to derive.
pub const MIN_DERIVABLE_DIMENSION: u32 = 96;

/// Geometric and structural metadata for a source image.
///
/// Built once per source image and shared read-only afterwards
/// (typically as `Arc<ImageDescriptor>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDescriptor {
    /// Full-resolution width in pixels
    pub width: u32,

    /// Full-resolution height in pixels
    pub height: u32,

    /// DWT resolution levels present in the codestream
    pub resolution_levels: u32,

    /// Levels exposed to clients, capped by the 96px threshold
    pub derivable_levels: u32,

    /// Quality (SNR) layers
    pub quality_layers: u32,

    /// Compositing layers (JPX)
    pub compositing_layer_count: u32,

    /// Bits per component
    pub bit_depth: u8,

    /// Number of channels
    pub channel_count: u16,

    /// Raw XML documents found in XML boxes, in file order
    pub embedded_xml_documents: Vec<String>,

    /// Container kind the descriptor was read from
    pub source_format: SourceFormat,
}

impl ImageDescriptor {
    /// Longest side in pixels.
    pub fn long_side(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Levels usable for reduction: `min(derivable_levels, resolution_levels)`.
    pub fn levels(&self) -> u32 {
        self.derivable_levels.min(self.resolution_levels)
    }

    /// Deep-zoom level count, `ceil(log2(max(width, height)))`.
    pub fn max_level(&self) -> u32 {
        max_level(self.width, self.height)
    }
}

/// `min(resolution_levels, floor(log2(max(w,h) / 96)))`, clamped at zero.
pub fn derivable_levels(width: u32, height: u32, resolution_levels: u32) -> u32 {
    let long_side = u64::from(width.max(height));
    let threshold = u64::from(MIN_DERIVABLE_DIMENSION);
    if long_side < threshold {
        return 0;
    }

    let mut levels = 0;
    while (threshold << (levels + 1)) <= long_side {
        levels += 1;
    }
    levels.min(resolution_levels)
}

/// `ceil(log2(max(width, height)))`; 0 for a 1x1 image.
pub fn max_level(width: u32, height: u32) -> u32 {
    let long_side = width.max(height);
    if long_side <= 1 {
        return 0;
    }
    32 - (long_side - 1).leading_zeros()
}
