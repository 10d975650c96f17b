//! Extraction plan resolver.
//!
//! Turns a [`DecodeRequest`] into the codec-facing [`ExtractionPlan`] for one
//! source image.
//!
//! # Reduction Policy
//!
//! With `levels = min(derivable_levels, resolution_levels)`:
//!
//! ```text
//! ExplicitLevel(L)         r = max(0, levels - L)        (L > levels -> 0)
//! ReductionFactor(r)       r = min(r, levels)
//! pixel target, full img   r = halvings - 1, within [0, levels]
//! anything else            r = 0
//! ```
//!
//! where `halvings` counts how often the long side is halved before it no
//! longer exceeds the target long side. The chosen resolution is the smallest
//! power-of-two reduction that is still at least as large as the target.
//!
//! # Region Fractions
//!
//! Pixel insets are divided by the native dimension; pixel extents by the
//! dimension already reduced by `2^r`, because the codec receives extents in
//! reduced coordinates. Percent regions are passed through as fractions.

use serde::Serialize;

use crate::error::ResolveError;
use crate::format::ImageDescriptor;
use crate::request::{DecodeRequest, Quality, RegionSpec, Rotation, SizeSpec};

/// Region of the reduced image, as fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionFraction {
    pub top: f64,
    pub left: f64,
    pub height: f64,
    pub width: f64,
}

impl RegionFraction {
    fn clamped(top: f64, left: f64, height: f64, width: f64) -> Self {
        Self {
            top: top.clamp(0.0, 1.0),
            left: left.clamp(0.0, 1.0),
            height: height.clamp(0.0, 1.0),
            width: width.clamp(0.0, 1.0),
        }
    }
}

/// A resolved, codec-ready extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionPlan {
    /// Resolution levels to discard; the codec downsamples by `2^r`
    pub reduction_factor: u32,

    /// Region of the reduced image; `None` extracts everything
    pub region: Option<RegionFraction>,

    pub rotation: Rotation,
    pub quality: Quality,

    /// 1-based compositing layer; `None` selects the first
    pub compositing_layer: Option<u32>,

    /// Image size after reduction
    pub reduced_width: u32,
    pub reduced_height: u32,

    /// Region size in the reduced image
    pub extract_width: u32,
    pub extract_height: u32,

    /// Size after applying the requested size, before rotation
    pub output_width: u32,
    pub output_height: u32,
}

impl ExtractionPlan {
    /// Downsampling factor, `2^reduction_factor`.
    pub fn scale(&self) -> u32 {
        1u32 << self.reduction_factor.min(31)
    }

    /// Final raster size, after rotation.
    pub fn final_dimensions(&self) -> (u32, u32) {
        if self.rotation.swaps_axes() {
            (self.output_height, self.output_width)
        } else {
            (self.output_width, self.output_height)
        }
    }

    /// Whether the output differs in size from the extracted region.
    pub fn needs_resize(&self) -> bool {
        (self.output_width, self.output_height) != (self.extract_width, self.extract_height)
    }
}

/// Resolve a request against a source image.
pub fn resolve(
    descriptor: &ImageDescriptor,
    request: &DecodeRequest,
) -> Result<ExtractionPlan, ResolveError> {
    let (width, height) = (descriptor.width, descriptor.height);
    let levels = descriptor.levels();

    let reduction_factor = match request.size {
        SizeSpec::ExplicitLevel(level) => reduction_for_level(levels, level),
        SizeSpec::ReductionFactor(r) => r.min(levels),
        size if size.implies_scale() && request.region.is_full() => {
            let (target_w, target_h) = size.apply(width, height);
            reduction_for_target(descriptor.long_side(), target_w.max(target_h), levels)
        }
        _ => 0,
    };

    let reduced_width = reduce_dimension(width, reduction_factor);
    let reduced_height = reduce_dimension(height, reduction_factor);
    let divisor = f64::from(1u32 << reduction_factor.min(31));

    let region = match request.region {
        RegionSpec::Full => None,
        RegionSpec::Pixels { x, y, w, h } => {
            if x > width {
                return Err(ResolveError::RegionOutOfBounds {
                    axis: "x",
                    inset: x,
                    dimension: width,
                });
            }
            if y > height {
                return Err(ResolveError::RegionOutOfBounds {
                    axis: "y",
                    inset: y,
                    dimension: height,
                });
            }
            Some(RegionFraction::clamped(
                f64::from(y) / f64::from(height),
                f64::from(x) / f64::from(width),
                f64::from(h) / (f64::from(height) / divisor),
                f64::from(w) / (f64::from(width) / divisor),
            ))
        }
        RegionSpec::Percent { x, y, w, h } => Some(RegionFraction::clamped(
            y / 100.0,
            x / 100.0,
            h / 100.0,
            w / 100.0,
        )),
    };

    let (extract_width, extract_height) = match &region {
        None => (reduced_width, reduced_height),
        Some(fraction) => (
            extract_extent(fraction.left, fraction.width, reduced_width),
            extract_extent(fraction.top, fraction.height, reduced_height),
        ),
    };

    // Scale-implying sizes only reduce full-image requests, so a region is
    // still at native resolution here
    let (output_width, output_height) = if request.size.implies_scale() {
        match region {
            None => request.size.apply(width, height),
            Some(_) => request.size.apply(extract_width, extract_height),
        }
    } else {
        (extract_width, extract_height)
    };

    Ok(ExtractionPlan {
        reduction_factor,
        region,
        rotation: request.rotation,
        quality: request.quality,
        compositing_layer: request.compositing_layer.filter(|layer| *layer > 0),
        reduced_width,
        reduced_height,
        extract_width,
        extract_height,
        output_width,
        output_height,
    })
}

/// `max(0, levels - level)`; a level above `levels` means no reduction.
pub fn reduction_for_level(levels: u32, level: u32) -> u32 {
    levels.saturating_sub(level)
}

/// Reduction for a target long side on a full-image request.
pub fn reduction_for_target(long_side: u32, target_long_side: u32, levels: u32) -> u32 {
    let target = f64::from(target_long_side.max(1));
    let mut long = f64::from(long_side);
    let mut halvings: i64 = 0;
    while long > target {
        long /= 2.0;
        halvings += 1;
    }

    let k = 1 + halvings;
    let scale_level = i64::from(levels) + 2 - k;
    (i64::from(levels) - scale_level).clamp(0, i64::from(levels)) as u32
}

/// Dimension after discarding `r` levels (rounded up, as the DWT does).
pub fn reduce_dimension(dimension: u32, reduction_factor: u32) -> u32 {
    let divisor = 1u64 << reduction_factor.min(31);
    (u64::from(dimension).div_ceil(divisor)) as u32
}

fn extract_extent(offset: f64, fraction: f64, dimension: u32) -> u32 {
    let start = (offset * f64::from(dimension)).round() as u32;
    let available = dimension.saturating_sub(start);
    let wanted = (fraction * f64::from(dimension)).round() as u32;
    wanted.min(available).max(1)
}
