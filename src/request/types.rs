//! Logical request types shared by the legacy and IIIF parsers.
//!
//! Both syntaxes produce the same [`DecodeRequest`]; everything downstream
//! (plan resolution, rendering, caching) only sees this form.

use std::fmt;

use serde::Serialize;

use crate::error::RequestError;

// =============================================================================
// Region
// =============================================================================

/// Requested region of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RegionSpec {
    /// The whole image
    #[default]
    Full,

    /// Pixel insets and extent
    Pixels { x: u32, y: u32, w: u32, h: u32 },

    /// Percent insets and extent, each in the 0-100 domain
    Percent { x: f64, y: f64, w: f64, h: f64 },
}

impl RegionSpec {
    pub fn is_full(&self) -> bool {
        matches!(self, RegionSpec::Full)
    }
}

// =============================================================================
// Size
// =============================================================================

/// Requested output size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SizeSpec {
    /// Native size of the region
    #[default]
    Full,

    /// Percentage of the region size
    Percent(f64),

    /// Width given, height derived from the aspect ratio
    ExplicitWidth(u32),

    /// Height given, width derived from the aspect ratio
    ExplicitHeight(u32),

    /// Both sides given; `constrained` keeps the aspect ratio inside the box
    ExplicitBoth {
        width: u32,
        height: u32,
        constrained: bool,
    },

    /// Explicit resolution level (0 = smallest)
    ExplicitLevel(u32),

    /// Number of resolution levels to discard
    ReductionFactor(u32),
}

impl SizeSpec {
    /// Whether the size asks for a pixel target (and so may pick a reduction).
    pub fn implies_scale(&self) -> bool {
        matches!(
            self,
            SizeSpec::Percent(_)
                | SizeSpec::ExplicitWidth(_)
                | SizeSpec::ExplicitHeight(_)
                | SizeSpec::ExplicitBoth { .. }
        )
    }

    /// Output dimensions for a region of `width` x `height` pixels.
    ///
    /// Level and reduction sizes leave the region untouched. Every side is at
    /// least one pixel.
    pub fn apply(&self, width: u32, height: u32) -> (u32, u32) {
        let (w, h) = (f64::from(width.max(1)), f64::from(height.max(1)));
        let (out_w, out_h) = match *self {
            SizeSpec::Full | SizeSpec::ExplicitLevel(_) | SizeSpec::ReductionFactor(_) => (w, h),
            SizeSpec::Percent(pct) => (w * pct / 100.0, h * pct / 100.0),
            SizeSpec::ExplicitWidth(target) => {
                let target = f64::from(target);
                (target, h * target / w)
            }
            SizeSpec::ExplicitHeight(target) => {
                let target = f64::from(target);
                (w * target / h, target)
            }
            SizeSpec::ExplicitBoth {
                width: tw,
                height: th,
                constrained: false,
            } => (f64::from(tw), f64::from(th)),
            SizeSpec::ExplicitBoth {
                width: tw,
                height: th,
                constrained: true,
            } => {
                let scale = (f64::from(tw) / w).min(f64::from(th) / h);
                (w * scale, h * scale)
            }
        };
        (to_pixels(out_w), to_pixels(out_h))
    }
}

fn to_pixels(value: f64) -> u32 {
    let rounded = value.round();
    if rounded < 1.0 {
        1
    } else if rounded > f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}

// =============================================================================
// Rotation
// =============================================================================

/// Axis-aligned rotation, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalize a degree value modulo 360.
    ///
    /// Returns `None` for anything that is not a multiple of 90.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether width and height swap after rotating.
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

// =============================================================================
// Quality
// =============================================================================

/// Colour treatment of the derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Native,
    Color,
    Grey,
    Bitonal,
}

impl Quality {
    pub const ALL: [Quality; 4] = [
        Quality::Native,
        Quality::Color,
        Quality::Grey,
        Quality::Bitonal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Native => "native",
            Quality::Color => "color",
            Quality::Grey => "grey",
            Quality::Bitonal => "bitonal",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Quality {
    type Err = RequestError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quality::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RequestError::InvalidQuality(s.to_string()))
    }
}

// =============================================================================
// Output Format
// =============================================================================

/// Output content type of a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Gif,
    Tiff,
    Jp2,
    Pdf,
}

impl OutputFormat {
    /// Supported types in preference order; the first is the default.
    pub const SUPPORTED: [OutputFormat; 6] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Gif,
        OutputFormat::Tiff,
        OutputFormat::Jp2,
        OutputFormat::Pdf,
    ];

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Jp2 => "image/jp2",
            OutputFormat::Pdf => "application/pdf",
        }
    }

    /// IIIF file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
            OutputFormat::Tiff => "tif",
            OutputFormat::Jp2 => "jp2",
            OutputFormat::Pdf => "pdf",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::SUPPORTED
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let mime = mime.trim();
        Self::SUPPORTED
            .into_iter()
            .find(|f| f.mime_type().eq_ignore_ascii_case(mime))
    }

    /// Pick an output type from an `Accept` header.
    ///
    /// Entries are tried by descending `q` (ties keep header order); wildcards
    /// match the first supported type they cover. Falls back to JPEG.
    pub fn negotiate(accept: Option<&str>) -> Self {
        let Some(accept) = accept else {
            return OutputFormat::default();
        };

        let mut preferences: Vec<(&str, f32)> = accept
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let media = parts.next()?.trim();
                if media.is_empty() {
                    return None;
                }
                let q = parts
                    .filter_map(|p| p.trim().strip_prefix("q="))
                    .find_map(|v| v.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((media, q))
            })
            .filter(|(_, q)| *q > 0.0)
            .collect();
        preferences.sort_by(|a, b| b.1.total_cmp(&a.1));

        preferences
            .into_iter()
            .find_map(|(media, _)| {
                Self::SUPPORTED
                    .into_iter()
                    .find(|f| media_matches(media, f.mime_type()))
            })
            .unwrap_or_default()
    }
}

fn media_matches(pattern: &str, mime: &str) -> bool {
    if pattern == "*/*" {
        return true;
    }
    if let Some(kind) = pattern.strip_suffix("/*") {
        return mime
            .split('/')
            .next()
            .is_some_and(|m| m.eq_ignore_ascii_case(kind));
    }
    pattern.eq_ignore_ascii_case(mime)
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

// =============================================================================
// Decode Request
// =============================================================================

/// A validated client request, independent of its surface syntax.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodeRequest {
    pub region: RegionSpec,
    pub size: SizeSpec,
    pub rotation: Rotation,
    pub quality: Quality,

    /// 1-based compositing layer; `None` selects the first
    pub compositing_layer: Option<u32>,

    /// Output type named by the request, if any
    pub format: Option<OutputFormat>,
}
