//! Legacy (djatoka-style) query parameter parser.
//!
//! # Parameters
//!
//! ```text
//! svc.region   Y,X,H,W        pixels, or fractions when any component has '.'
//! svc.scale    N | W,H | F    long side, box (0 = derive), or factor in (0,2)
//! svc.level    L              explicit resolution level
//! svc.reduce   R              levels to discard
//! svc.rotate   D              degrees, multiples of 90
//! svc.format   MIME           output type
//! svc.clayer   N              compositing layer (<= 0 means first)
//! ```
//!
//! `svc.scale`, `svc.level` and `svc.reduce` are mutually exclusive.

use tracing::warn;

use crate::error::RequestError;

use super::types::{DecodeRequest, OutputFormat, RegionSpec, Rotation, SizeSpec};

pub const PARAM_REGION: &str = "svc.region";
pub const PARAM_SCALE: &str = "svc.scale";
pub const PARAM_LEVEL: &str = "svc.level";
pub const PARAM_REDUCE: &str = "svc.reduce";
pub const PARAM_ROTATE: &str = "svc.rotate";
pub const PARAM_FORMAT: &str = "svc.format";
pub const PARAM_CLAYER: &str = "svc.clayer";

/// Raw legacy service parameters, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyParams {
    pub region: Option<String>,
    pub scale: Option<String>,
    pub level: Option<String>,
    pub reduce: Option<String>,
    pub rotate: Option<String>,
    pub format: Option<String>,
    pub clayer: Option<String>,
}

impl LegacyParams {
    /// Collect the `svc.*` parameters from decoded query pairs.
    ///
    /// Unknown keys are ignored; a repeated key keeps its last value. Empty
    /// values count as absent.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut params = LegacyParams::default();
        for (key, value) in pairs {
            let slot = match key {
                PARAM_REGION => &mut params.region,
                PARAM_SCALE => &mut params.scale,
                PARAM_LEVEL => &mut params.level,
                PARAM_REDUCE => &mut params.reduce,
                PARAM_ROTATE => &mut params.rotate,
                PARAM_FORMAT => &mut params.format,
                PARAM_CLAYER => &mut params.clayer,
                _ => continue,
            };
            let value = value.trim();
            *slot = (!value.is_empty()).then(|| value.to_string());
        }
        params
    }

    /// Whether any derivative parameter is present.
    pub fn is_empty(&self) -> bool {
        *self == LegacyParams::default()
    }

    /// Validate into a [`DecodeRequest`].
    pub fn parse(&self) -> Result<DecodeRequest, RequestError> {
        parse_legacy(self)
    }
}

/// Validate legacy parameters into a [`DecodeRequest`].
pub fn parse_legacy(params: &LegacyParams) -> Result<DecodeRequest, RequestError> {
    let region = match params.region.as_deref() {
        Some(region) => parse_region(region)?,
        None => RegionSpec::Full,
    };

    let size = parse_size(
        params.scale.as_deref(),
        params.level.as_deref(),
        params.reduce.as_deref(),
    )?;

    let rotation = match params.rotate.as_deref() {
        Some(rotate) => parse_rotation(rotate)?,
        None => Rotation::Deg0,
    };

    let format = params
        .format
        .as_deref()
        .map(|mime| {
            OutputFormat::from_mime_type(mime)
                .ok_or_else(|| RequestError::InvalidFormat(mime.to_string()))
        })
        .transpose()?;

    let compositing_layer = match params.clayer.as_deref() {
        Some(clayer) => parse_clayer(clayer)?,
        None => None,
    };

    Ok(DecodeRequest {
        region,
        size,
        rotation,
        quality: Default::default(),
        compositing_layer,
        format,
    })
}

/// Parse `Y,X,H,W`.
///
/// A single '.' anywhere makes the whole region fractional; fractions become
/// percent values and are not upper-bound checked.
pub fn parse_region(value: &str) -> Result<RegionSpec, RequestError> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '{' && *c != '}')
        .collect();

    if cleaned.is_empty()
        || cleaned.eq_ignore_ascii_case("all")
        || cleaned.eq_ignore_ascii_case("full")
    {
        return Ok(RegionSpec::Full);
    }

    let parts: Vec<&str> = cleaned.split(',').collect();
    if parts.len() != 4 {
        return Err(RequestError::OutOfDomain {
            field: "region",
            message: format!("expected 4 components (Y,X,H,W), got {}", parts.len()),
        });
    }

    if parts.iter().any(|p| p.contains('.')) {
        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = parse_f64("region", part)?;
        }
        let [y, x, h, w] = values;
        check_extent(x, y, w, h)?;
        return Ok(RegionSpec::Percent {
            x: x * 100.0,
            y: y * 100.0,
            w: w * 100.0,
            h: h * 100.0,
        });
    }

    let mut values = [0i64; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = parse_i64("region", part)?;
    }
    let [y, x, h, w] = values;
    check_extent(x as f64, y as f64, w as f64, h as f64)?;

    Ok(RegionSpec::Pixels {
        x: to_u32("region", x)?,
        y: to_u32("region", y)?,
        w: to_u32("region", w)?,
        h: to_u32("region", h)?,
    })
}

fn check_extent(x: f64, y: f64, w: f64, h: f64) -> Result<(), RequestError> {
    if x < 0.0 || y < 0.0 {
        return Err(RequestError::OutOfDomain {
            field: "region",
            message: "insets must not be negative".to_string(),
        });
    }
    if w <= 0.0 || h <= 0.0 {
        return Err(RequestError::OutOfDomain {
            field: "region",
            message: "height and width must be positive".to_string(),
        });
    }
    Ok(())
}

fn parse_size(
    scale: Option<&str>,
    level: Option<&str>,
    reduce: Option<&str>,
) -> Result<SizeSpec, RequestError> {
    match (scale, level, reduce) {
        (None, None, None) => Ok(SizeSpec::Full),
        (Some(scale), None, None) => parse_scale(scale),
        (None, Some(level), None) => Ok(SizeSpec::ExplicitLevel(parse_u32("level", level)?)),
        (None, None, Some(reduce)) => {
            Ok(SizeSpec::ReductionFactor(parse_u32("reduce", reduce)?))
        }
        _ => Err(RequestError::Conflict(format!(
            "only one of {}, {} and {} may be given",
            PARAM_SCALE, PARAM_LEVEL, PARAM_REDUCE
        ))),
    }
}

/// Parse `svc.scale`: a long side, a `W,H` box, or a factor in (0,2).
pub fn parse_scale(value: &str) -> Result<SizeSpec, RequestError> {
    let value = value.trim();

    if let Some((w, h)) = value.split_once(',') {
        let width = parse_u32("scale", w)?;
        let height = parse_u32("scale", h)?;
        return match (width, height) {
            (0, 0) => Err(RequestError::OutOfDomain {
                field: "scale",
                message: "width and height cannot both be 0".to_string(),
            }),
            (w, 0) => Ok(SizeSpec::ExplicitWidth(w)),
            (0, h) => Ok(SizeSpec::ExplicitHeight(h)),
            (width, height) => Ok(SizeSpec::ExplicitBoth {
                width,
                height,
                constrained: false,
            }),
        };
    }

    if value.contains('.') {
        let factor = parse_f64("scale", value)?;
        if factor <= 0.0 || factor >= 2.0 {
            return Err(RequestError::OutOfDomain {
                field: "scale",
                message: format!("scaling factor {} is outside (0, 2)", factor),
            });
        }
        return Ok(SizeSpec::Percent(factor * 100.0));
    }

    let long_side = parse_u32("scale", value)?;
    if long_side == 0 {
        return Err(RequestError::OutOfDomain {
            field: "scale",
            message: "long side must be positive".to_string(),
        });
    }
    Ok(SizeSpec::ExplicitBoth {
        width: long_side,
        height: long_side,
        constrained: true,
    })
}

/// Non-multiples of 90 are ignored rather than rejected.
fn parse_rotation(value: &str) -> Result<Rotation, RequestError> {
    let degrees = parse_i64("rotate", value)?;
    match Rotation::from_degrees(degrees) {
        Some(rotation) => Ok(rotation),
        None => {
            warn!(degrees, "ignoring rotation that is not a multiple of 90");
            Ok(Rotation::Deg0)
        }
    }
}

fn parse_clayer(value: &str) -> Result<Option<u32>, RequestError> {
    let layer = parse_i64("clayer", value)?;
    if layer <= 0 {
        return Ok(None);
    }
    to_u32("clayer", layer).map(Some)
}

fn parse_i64(field: &'static str, value: &str) -> Result<i64, RequestError> {
    value
        .trim()
        .parse()
        .map_err(|_| RequestError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, RequestError> {
    let parsed = parse_i64(field, value)?;
    if parsed < 0 {
        return Err(RequestError::OutOfDomain {
            field,
            message: format!("{} must not be negative", parsed),
        });
    }
    to_u32(field, parsed)
}

fn parse_f64(field: &'static str, value: &str) -> Result<f64, RequestError> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| RequestError::InvalidNumber {
            field,
            value: value.to_string(),
        })?;
    if !parsed.is_finite() {
        return Err(RequestError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    Ok(parsed)
}

fn to_u32(field: &'static str, value: i64) -> Result<u32, RequestError> {
    u32::try_from(value).map_err(|_| RequestError::OutOfDomain {
        field,
        message: format!("{} is out of range", value),
    })
}
