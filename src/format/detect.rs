//! Source format detection.
//!
//! Two container kinds are accepted:
//!
//! - **JP2**: box-wrapped file starting with the 12-byte signature box
//! - **Bare J2K codestream**: starts directly with the SOC marker (0xFF4F)

use serde::Serialize;

use super::jp2::boxes::{BoxType, SIGNATURE_BOX_LENGTH, SIGNATURE_CONTENT};
use super::jp2::codestream::SOC;

/// Container kind of a JPEG 2000 source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// JP2 file format (boxes around a codestream)
    Jp2,

    /// Raw codestream without box wrapping
    J2kCodestream,
}

impl SourceFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            SourceFormat::Jp2 => "JPEG 2000 (JP2)",
            SourceFormat::J2kCodestream => "JPEG 2000 codestream",
        }
    }
}

/// Detect the container kind from the leading bytes.
///
/// Returns `None` when neither a signature box nor a SOC marker is present.
pub fn detect_source_format(bytes: &[u8]) -> Option<SourceFormat> {
    if is_codestream_start(bytes) {
        return Some(SourceFormat::J2kCodestream);
    }
    if is_jp2_signature(bytes) {
        return Some(SourceFormat::Jp2);
    }
    None
}

/// Whether the bytes start with the SOC marker.
pub fn is_codestream_start(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && u16::from_be_bytes([bytes[0], bytes[1]]) == SOC
}

/// Whether the bytes start with a complete JP2 signature box.
pub fn is_jp2_signature(bytes: &[u8]) -> bool {
    bytes.len() >= 12
        && bytes[0..4] == SIGNATURE_BOX_LENGTH.to_be_bytes()
        && bytes[4..8] == *BoxType::SIGNATURE.as_bytes()
        && bytes[8..12] == SIGNATURE_CONTENT
}
