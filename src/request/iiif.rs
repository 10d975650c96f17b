//! IIIF Image API path parser.
//!
//! ```text
//! {identifier}/{region}/{size}/{rotation}/{quality}[.{format}]
//!
//! region    full | x,y,w,h | pct:x,y,w,h
//! size      full | max | w, | ,h | w,h | !w,h | pct:n
//! rotation  0 | 90 | 180 | 270   (other numbers are flagged, not rejected)
//! quality   native | color | grey | bitonal
//! format    jpg | png | gif | tif | jp2 | pdf
//! ```
//!
//! [`Region`] and [`Size`] print back to the exact syntax they parse, so a
//! formatted value always re-parses to itself.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::RequestError;

use super::types::{DecodeRequest, OutputFormat, Quality, RegionSpec, Rotation, SizeSpec};

/// Number of path segments in an image request.
pub const SEGMENT_COUNT: usize = 5;

// =============================================================================
// Region
// =============================================================================

/// IIIF region parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    Full,
    Pixels { x: u32, y: u32, w: u32, h: u32 },
    Percent { x: f64, y: f64, w: f64, h: f64 },
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Full => f.write_str("full"),
            Region::Pixels { x, y, w, h } => write!(f, "{},{},{},{}", x, y, w, h),
            Region::Percent { x, y, w, h } => write!(f, "pct:{},{},{},{}", x, y, w, h),
        }
    }
}

impl FromStr for Region {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "full" {
            return Ok(Region::Full);
        }

        if let Some(pct) = s.strip_prefix("pct:") {
            let [x, y, w, h] = split_four("region", pct, parse_f64)?;
            if x < 0.0 || y < 0.0 {
                return Err(out_of_domain("region", "insets must not be negative"));
            }
            if !(w > 0.0 && w <= 100.0 && h > 0.0 && h <= 100.0) {
                return Err(out_of_domain("region", "percent extent must be in (0, 100]"));
            }
            return Ok(Region::Percent { x, y, w, h });
        }

        let [x, y, w, h] = split_four("region", s, parse_u32)?;
        if w == 0 || h == 0 {
            return Err(out_of_domain("region", "width and height must be positive"));
        }
        Ok(Region::Pixels { x, y, w, h })
    }
}

impl From<Region> for RegionSpec {
    fn from(region: Region) -> Self {
        match region {
            Region::Full => RegionSpec::Full,
            Region::Pixels { x, y, w, h } => RegionSpec::Pixels { x, y, w, h },
            Region::Percent { x, y, w, h } => RegionSpec::Percent { x, y, w, h },
        }
    }
}

// =============================================================================
// Size
// =============================================================================

/// IIIF size parameter. `max` parses as [`Size::Full`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Size {
    Full,
    Percent(f64),
    Width(u32),
    Height(u32),
    Exact { w: u32, h: u32 },
    BestFit { w: u32, h: u32 },
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Full => f.write_str("full"),
            Size::Percent(n) => write!(f, "pct:{}", n),
            Size::Width(w) => write!(f, "{},", w),
            Size::Height(h) => write!(f, ",{}", h),
            Size::Exact { w, h } => write!(f, "{},{}", w, h),
            Size::BestFit { w, h } => write!(f, "!{},{}", w, h),
        }
    }
}

impl FromStr for Size {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "full" || s == "max" {
            return Ok(Size::Full);
        }

        if let Some(pct) = s.strip_prefix("pct:") {
            let n = parse_f64("size", pct)?;
            if !(0.0..=100.0).contains(&n) {
                return Err(out_of_domain("size", "percent must be in [0, 100]"));
            }
            return Ok(Size::Percent(n));
        }

        let (best_fit, dims) = match s.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (w, h) = dims.split_once(',').ok_or_else(|| RequestError::OutOfDomain {
            field: "size",
            message: format!("unrecognised size '{}'", s),
        })?;

        let w = (!w.is_empty()).then(|| parse_u32("size", w)).transpose()?;
        let h = (!h.is_empty()).then(|| parse_u32("size", h)).transpose()?;
        if w == Some(0) || h == Some(0) {
            return Err(out_of_domain("size", "width and height must be positive"));
        }

        match (best_fit, w, h) {
            (false, Some(w), None) => Ok(Size::Width(w)),
            (false, None, Some(h)) => Ok(Size::Height(h)),
            (false, Some(w), Some(h)) => Ok(Size::Exact { w, h }),
            (true, Some(w), Some(h)) => Ok(Size::BestFit { w, h }),
            _ => Err(RequestError::OutOfDomain {
                field: "size",
                message: format!("unrecognised size '{}'", s),
            }),
        }
    }
}

impl From<Size> for SizeSpec {
    fn from(size: Size) -> Self {
        match size {
            Size::Full => SizeSpec::Full,
            Size::Percent(n) => SizeSpec::Percent(n),
            Size::Width(w) => SizeSpec::ExplicitWidth(w),
            Size::Height(h) => SizeSpec::ExplicitHeight(h),
            Size::Exact { w, h } => SizeSpec::ExplicitBoth {
                width: w,
                height: h,
                constrained: false,
            },
            Size::BestFit { w, h } => SizeSpec::ExplicitBoth {
                width: w,
                height: h,
                constrained: true,
            },
        }
    }
}

// =============================================================================
// Image Request
// =============================================================================

/// A parsed IIIF image request.
#[derive(Debug, Clone, PartialEq)]
pub struct IiifRequest {
    /// Fully decoded identifier
    pub identifier: String,
    pub region: Region,
    pub size: Size,
    pub rotation: Rotation,

    /// Rotation value that was accepted but will not be applied
    pub unsupported_rotation: Option<f64>,
    pub quality: Quality,
    pub format: OutputFormat,

    /// Whether `format` came from a file extension rather than negotiation
    pub explicit_format: bool,
}

impl IiifRequest {
    /// Convert to the syntax-independent request.
    pub fn to_decode_request(&self) -> DecodeRequest {
        DecodeRequest {
            region: self.region.into(),
            size: self.size.into(),
            rotation: self.rotation,
            quality: self.quality,
            compositing_layer: None,
            format: Some(self.format),
        }
    }
}

/// Parse a full request path (a single leading '/' is tolerated).
pub fn parse_path(path: &str, accept: Option<&str>) -> Result<IiifRequest, RequestError> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() != SEGMENT_COUNT {
        return Err(RequestError::SegmentCount {
            expected: SEGMENT_COUNT,
            found: segments.len(),
        });
    }
    parse_segments(
        segments[0],
        segments[1],
        segments[2],
        segments[3],
        segments[4],
        accept,
    )
}

/// Parse the five path segments individually.
pub fn parse_segments(
    identifier: &str,
    region: &str,
    size: &str,
    rotation: &str,
    quality_format: &str,
    accept: Option<&str>,
) -> Result<IiifRequest, RequestError> {
    let identifier = decode_identifier(identifier)?;
    let region: Region = region.parse()?;
    let size: Size = size.parse()?;
    let (rotation, unsupported_rotation) = parse_rotation(rotation)?;

    let (quality, extension) = match quality_format.rsplit_once('.') {
        Some((quality, ext)) => (quality, Some(ext)),
        None => (quality_format, None),
    };
    let quality: Quality = quality.parse()?;

    let (format, explicit_format) = match extension {
        Some(ext) => (
            OutputFormat::from_extension(ext)
                .ok_or_else(|| RequestError::InvalidFormat(ext.to_string()))?,
            true,
        ),
        None => (OutputFormat::negotiate(accept), false),
    };

    Ok(IiifRequest {
        identifier,
        region,
        size,
        rotation,
        unsupported_rotation,
        quality,
        format,
        explicit_format,
    })
}

/// Percent-decode an identifier, with a second pass for double encoding.
pub fn decode_identifier(raw: &str) -> Result<String, RequestError> {
    let once = percent_decode("identifier", raw)?;
    let decoded = if has_percent_escape(&once) {
        percent_decode("identifier", &once)?
    } else {
        once
    };
    if decoded.is_empty() {
        return Err(RequestError::Missing("identifier"));
    }
    Ok(decoded)
}

fn percent_decode(field: &'static str, value: &str) -> Result<String, RequestError> {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| RequestError::OutOfDomain {
            field,
            message: "percent-decoding produced invalid UTF-8".to_string(),
        })
}

fn has_percent_escape(value: &str) -> bool {
    value
        .as_bytes()
        .windows(3)
        .any(|w| w[0] == b'%' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit())
}

/// Axis-aligned values map to a [`Rotation`]; other angles are flagged.
fn parse_rotation(value: &str) -> Result<(Rotation, Option<f64>), RequestError> {
    if value.starts_with('!') {
        return Err(out_of_domain("rotation", "mirroring is not supported"));
    }
    let degrees = parse_f64("rotation", value)?;

    let supported = if degrees.fract() == 0.0 && (0.0..360.0).contains(&degrees) {
        Rotation::from_degrees(degrees as i64)
    } else {
        None
    };

    match supported {
        Some(rotation) => Ok((rotation, None)),
        None => {
            warn!(degrees, "unsupported rotation; serving unrotated");
            Ok((Rotation::Deg0, Some(degrees)))
        }
    }
}

fn split_four<T>(
    field: &'static str,
    value: &str,
    parse: fn(&'static str, &str) -> Result<T, RequestError>,
) -> Result<[T; 4], RequestError> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 4 {
        return Err(RequestError::OutOfDomain {
            field,
            message: format!("expected 4 comma-separated values, got {}", parts.len()),
        });
    }
    Ok([
        parse(field, parts[0])?,
        parse(field, parts[1])?,
        parse(field, parts[2])?,
        parse(field, parts[3])?,
    ])
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, RequestError> {
    value.parse().map_err(|_| RequestError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_f64(field: &'static str, value: &str) -> Result<f64, RequestError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RequestError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

fn out_of_domain(field: &'static str, message: &str) -> RequestError {
    RequestError::OutOfDomain {
        field,
        message: message.to_string(),
    }
}
