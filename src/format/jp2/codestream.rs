//! Minimal JPEG 2000 codestream main-header reader.
//!
//! Only the markers needed for metadata are read:
//!
//! ```text
//! SOC  0xFF4F  start of codestream (no segment)
//! SIZ  0xFF51  image and tile size
//! CAP  0xFF50  extended capabilities (Part 15, sits between SIZ and COD)
//! COD  0xFF52  coding style default: quality layers and DWT levels
//! ```
//!
//! Reading stops right after COD; tile-part markers are never visited.

use crate::error::FormatError;
use crate::format::cursor::ByteCursor;

/// Start of codestream
pub const SOC: u16 = 0xFF4F;
/// Image and tile size
pub const SIZ: u16 = 0xFF51;
/// Extended capabilities
pub const CAP: u16 = 0xFF50;
/// Coding style default
pub const COD: u16 = 0xFF52;

/// Fields read from the codestream main header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodestreamHeader {
    /// Reference grid width minus the image X offset
    pub width: u32,

    /// Reference grid height minus the image Y offset
    pub height: u32,

    /// Number of components (Csiz)
    pub components: u16,

    /// Bit depth of the first component
    pub bit_depth: u8,

    /// Number of quality layers (from COD)
    pub quality_layers: u16,

    /// Number of DWT decomposition levels (from COD)
    pub dwt_levels: u8,
}

/// Read the main header, starting at the SOC marker.
///
/// On success the cursor sits just past the COD segment.
pub fn read_main_header(cursor: &mut ByteCursor<'_>) -> Result<CodestreamHeader, FormatError> {
    expect_marker(cursor, SOC, "SOC")?;
    expect_marker(cursor, SIZ, "SIZ")?;

    let siz = read_segment(cursor, "SIZ")?;
    let (width, height, components, bit_depth) = parse_siz(siz)?;

    loop {
        let marker = cursor.read_u16()?;
        match marker {
            CAP => {
                read_segment(cursor, "CAP")?;
            }
            COD => {
                let cod = read_segment(cursor, "COD")?;
                let (quality_layers, dwt_levels) = parse_cod(cod)?;
                return Ok(CodestreamHeader {
                    width,
                    height,
                    components,
                    bit_depth,
                    quality_layers,
                    dwt_levels,
                });
            }
            found => {
                return Err(FormatError::UnexpectedMarker {
                    expected: "COD",
                    found,
                })
            }
        }
    }
}

fn expect_marker(
    cursor: &mut ByteCursor<'_>,
    marker: u16,
    name: &'static str,
) -> Result<(), FormatError> {
    let found = cursor.read_u16()?;
    if found != marker {
        return Err(FormatError::UnexpectedMarker {
            expected: name,
            found,
        });
    }
    Ok(())
}

/// Read a marker segment body (the length field counts itself).
fn read_segment<'a>(
    cursor: &mut ByteCursor<'a>,
    marker: &'static str,
) -> Result<&'a [u8], FormatError> {
    let length = cursor.read_u16()?;
    if length < 2 {
        return Err(FormatError::InvalidSegmentLength { marker, length });
    }
    cursor.take(length as usize - 2)
}

fn parse_siz(body: &[u8]) -> Result<(u32, u32, u16, u8), FormatError> {
    let mut siz = ByteCursor::new(body);
    let _rsiz = siz.read_u16()?;
    let xsiz = siz.read_u32()?;
    let ysiz = siz.read_u32()?;
    let x_origin = siz.read_u32()?;
    let y_origin = siz.read_u32()?;
    // Tile size and tile origin
    siz.skip(16)?;
    let components = siz.read_u16()?;
    let ssiz = siz.read_u8()?;

    Ok((
        xsiz.saturating_sub(x_origin),
        ysiz.saturating_sub(y_origin),
        components,
        (ssiz & 0x7F) + 1,
    ))
}

fn parse_cod(body: &[u8]) -> Result<(u16, u8), FormatError> {
    let mut cod = ByteCursor::new(body);
    let _scod = cod.read_u8()?;
    let _progression = cod.read_u8()?;
    let layers = cod.read_u16()?;
    let _mct = cod.read_u8()?;
    let levels = cod.read_u8()?;
    Ok((layers, levels))
}
