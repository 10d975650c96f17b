//! JP2 box headers.
//!
//! A JP2 file is a sequence of boxes:
//!
//! ```text
//! Bytes 0-3: LBox, total box length including this header (big-endian)
//! Bytes 4-7: TBox, four-character type code
//! [Bytes 8-15: XLBox, present only when LBox == 1]
//! Payload
//! ```
//!
//! LBox == 0 means the box runs to the end of the file. LBox == 1 means the
//! real length is in XLBox; only lengths whose upper 32 bits are zero are
//! accepted.

use std::fmt;

use crate::error::FormatError;
use crate::format::cursor::ByteCursor;

/// Four-character box type code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxType(pub [u8; 4]);

impl BoxType {
    /// JP2 signature box - 'jP\x20\x20'
    pub const SIGNATURE: BoxType = BoxType(*b"jP  ");
    /// File type box - 'ftyp'
    pub const FILE_TYPE: BoxType = BoxType(*b"ftyp");
    /// JP2 header superbox - 'jp2h'
    pub const JP2_HEADER: BoxType = BoxType(*b"jp2h");
    /// Image header box - 'ihdr'
    pub const IMAGE_HEADER: BoxType = BoxType(*b"ihdr");
    /// Colour specification box - 'colr'
    pub const COLOUR_SPECIFICATION: BoxType = BoxType(*b"colr");
    /// Resolution superbox - 'res\x20'
    pub const RESOLUTION: BoxType = BoxType(*b"res ");
    /// XML box - 'xml\x20'
    pub const XML: BoxType = BoxType(*b"xml ");
    /// Contiguous codestream box - 'jp2c'
    pub const CODESTREAM: BoxType = BoxType(*b"jp2c");
    /// Compositing layer header box (JPX) - 'jplh'
    pub const COMPOSITING_LAYER_HEADER: BoxType = BoxType(*b"jplh");

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxType({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// Content of the signature box payload.
pub const SIGNATURE_CONTENT: [u8; 4] = [0x0D, 0x0A, 0x87, 0x0A];

/// Declared length of the signature box.
pub const SIGNATURE_BOX_LENGTH: u32 = 12;

/// A parsed box header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    /// Box type code
    pub box_type: BoxType,

    /// Size of the header itself (8, or 16 with an XLBox field)
    pub header_len: usize,

    /// Payload length in bytes
    pub payload_len: usize,
}

/// Read a box header at the cursor position.
///
/// On success the cursor sits at the start of the payload.
pub fn read_box_header(cursor: &mut ByteCursor<'_>) -> Result<BoxHeader, FormatError> {
    let length = cursor.read_u32()?;
    let mut box_type = [0u8; 4];
    box_type.copy_from_slice(cursor.take(4)?);
    let box_type = BoxType(box_type);

    let (total, header_len) = match length {
        0 => {
            // Runs to the end of the file
            return Ok(BoxHeader {
                box_type,
                header_len: 8,
                payload_len: cursor.remaining(),
            });
        }
        1 => {
            let high = cursor.read_u32()?;
            if high != 0 {
                return Err(FormatError::BoxTooLarge {
                    box_type: box_type.to_string(),
                });
            }
            (cursor.read_u32()? as usize, 16)
        }
        n => (n as usize, 8),
    };

    if total < header_len {
        return Err(FormatError::InvalidBoxLength {
            box_type: box_type.to_string(),
            length: total as u64,
        });
    }

    Ok(BoxHeader {
        box_type,
        header_len,
        payload_len: total - header_len,
    })
}

/// Read and verify the mandatory signature box.
pub fn read_signature_box(cursor: &mut ByteCursor<'_>) -> Result<(), FormatError> {
    let length = cursor.read_u32().map_err(|_| not_jp2("file too small"))?;
    let box_type = cursor.take(4).map_err(|_| not_jp2("file too small"))?;

    if box_type != BoxType::SIGNATURE.as_bytes() {
        return Err(not_jp2("missing signature box"));
    }
    if length != SIGNATURE_BOX_LENGTH {
        return Err(not_jp2(&format!(
            "signature box length is {}, expected {}",
            length, SIGNATURE_BOX_LENGTH
        )));
    }

    let content = cursor
        .take(SIGNATURE_CONTENT.len())
        .map_err(|_| not_jp2("truncated signature box"))?;
    if content != SIGNATURE_CONTENT {
        return Err(not_jp2("bad signature content"));
    }

    Ok(())
}

fn not_jp2(reason: &str) -> FormatError {
    FormatError::NotJp2 {
        reason: reason.to_string(),
    }
}

/// Count occurrences of the compositing layer header type code in `data`.
pub fn count_box_type(data: &[u8], box_type: BoxType) -> usize {
    data.windows(4)
        .filter(|window| *window == box_type.as_bytes())
        .count()
}
