//! JP2 metadata extraction.
//!
//! Walks the box structure of a JP2 file (or a bare codestream) and produces
//! an [`ImageDescriptor`] without decoding any pixels.
//!
//! # Parse Order
//!
//! 1. Signature box (`jP\x20\x20`, 12 bytes, fixed content)
//! 2. File type box (`ftyp`), payload skipped
//! 3. Header boxes until `jp2c`:
//!    - `jp2h` is descended into
//!    - `ihdr` gives height, width, channels and bit depth
//!    - `colr` is validated and skipped
//!    - `xml ` payloads are collected as text
//!    - anything else is skipped by its declared length
//! 4. Codestream main header (SIZ, COD)
//! 5. Remaining bytes are scanned for `jplh` to count compositing layers

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::FormatError;
use crate::format::cursor::ByteCursor;
use crate::format::detect::{is_codestream_start, SourceFormat};

use super::boxes::{count_box_type, read_box_header, read_signature_box, BoxType};
use super::codestream::{read_main_header, CodestreamHeader, SOC};
use super::descriptor::{derivable_levels, ImageDescriptor};

/// `colr` method carrying an enumerated colourspace (4 bytes).
const COLR_METHOD_ENUMERATED: u8 = 1;

/// Stored bit depth value that is corrected on read.
const LEGACY_BIT_DEPTH: u8 = 7;

/// Fields read from the `ihdr` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ImageHeader {
    height: u32,
    width: u32,
    channels: u16,
    bit_depth: u8,
}

/// Extract a descriptor from a stream.
///
/// The stream is read to the end and dropped before parsing starts, so it is
/// consumed and closed whether or not parsing succeeds.
pub fn extract<R: Read>(mut reader: R) -> Result<ImageDescriptor, FormatError> {
    let mut data = Vec::new();
    let read = reader.read_to_end(&mut data);
    drop(reader);
    read?;

    parse_descriptor(&data)
}

/// Extract a descriptor from a file on disk.
pub fn extract_from_path(path: &Path) -> Result<ImageDescriptor, FormatError> {
    let file = File::open(path)?;
    extract(file)
}

/// Parse a descriptor from an in-memory JP2 file or bare codestream.
pub fn parse_descriptor(data: &[u8]) -> Result<ImageDescriptor, FormatError> {
    if is_codestream_start(data) {
        return parse_codestream(data);
    }
    parse_jp2(data)
}

fn parse_codestream(data: &[u8]) -> Result<ImageDescriptor, FormatError> {
    let mut cursor = ByteCursor::new(data);
    let codestream = read_main_header(&mut cursor)?;

    build_descriptor(
        None,
        codestream,
        Vec::new(),
        compositing_layer_count(cursor.rest()),
        SourceFormat::J2kCodestream,
    )
}

fn parse_jp2(data: &[u8]) -> Result<ImageDescriptor, FormatError> {
    let mut cursor = ByteCursor::new(data);
    read_signature_box(&mut cursor)?;

    let file_type = read_box_header(&mut cursor)?;
    if file_type.box_type != BoxType::FILE_TYPE {
        return Err(FormatError::UnexpectedBox {
            expected: BoxType::FILE_TYPE.to_string(),
            found: file_type.box_type.to_string(),
        });
    }
    cursor.skip(file_type.payload_len)?;

    let mut image_header = None;
    let mut xml_documents = Vec::new();

    loop {
        if cursor.is_empty() {
            return Err(FormatError::MissingCodestream);
        }
        // Some writers place the codestream without a jp2c wrapper
        if cursor.peek_u16() == Some(SOC) {
            break;
        }

        let header = read_box_header(&mut cursor)?;
        match header.box_type {
            BoxType::JP2_HEADER => {
                // Superbox: children are read as the following boxes
                continue;
            }
            BoxType::CODESTREAM => break,
            BoxType::IMAGE_HEADER => {
                let payload = cursor.take(header.payload_len)?;
                image_header = Some(parse_image_header(payload)?);
            }
            BoxType::COLOUR_SPECIFICATION => {
                let payload = cursor.take(header.payload_len)?;
                parse_colour_specification(payload)?;
            }
            BoxType::XML => {
                let payload = cursor.take(header.payload_len)?;
                xml_documents.push(String::from_utf8_lossy(payload).into_owned());
            }
            other => {
                debug!(box_type = %other, length = header.payload_len, "skipping box");
                cursor.skip(header.payload_len)?;
            }
        }
    }

    let codestream = read_main_header(&mut cursor)?;
    let layers = compositing_layer_count(cursor.rest());

    build_descriptor(
        image_header,
        codestream,
        xml_documents,
        layers,
        SourceFormat::Jp2,
    )
}

fn parse_image_header(payload: &[u8]) -> Result<ImageHeader, FormatError> {
    let mut ihdr = ByteCursor::new(payload);
    let height = ihdr.read_u32()?;
    let width = ihdr.read_u32()?;
    let channels = ihdr.read_u16()?;
    let mut bit_depth = ihdr.read_u8()?;
    if bit_depth == LEGACY_BIT_DEPTH {
        bit_depth = 8;
    }
    // Compression type, colourspace-unknown flag, IPR flag
    ihdr.skip(3)?;

    Ok(ImageHeader {
        height,
        width,
        channels,
        bit_depth,
    })
}

fn parse_colour_specification(payload: &[u8]) -> Result<(), FormatError> {
    let mut colr = ByteCursor::new(payload);
    let method = colr.read_u8()?;
    // Precedence and approximation
    colr.skip(2)?;
    if method == COLR_METHOD_ENUMERATED {
        colr.skip(4)?;
    }
    // ICC profiles are left in the payload unread
    Ok(())
}

/// One implicit layer plus one per `jplh` box; zero when nothing follows.
fn compositing_layer_count(rest: &[u8]) -> u32 {
    if rest.is_empty() {
        return 0;
    }
    1 + count_box_type(rest, BoxType::COMPOSITING_LAYER_HEADER) as u32
}

fn build_descriptor(
    image_header: Option<ImageHeader>,
    codestream: CodestreamHeader,
    embedded_xml_documents: Vec<String>,
    compositing_layer_count: u32,
    source_format: SourceFormat,
) -> Result<ImageDescriptor, FormatError> {
    let (width, height, channel_count, bit_depth) = match image_header {
        Some(ihdr) => (ihdr.width, ihdr.height, ihdr.channels, ihdr.bit_depth),
        None => (
            codestream.width,
            codestream.height,
            codestream.components,
            codestream.bit_depth,
        ),
    };

    if width == 0 || height == 0 {
        return Err(FormatError::InvalidDimensions { width, height });
    }

    let resolution_levels = u32::from(codestream.dwt_levels);

    Ok(ImageDescriptor {
        width,
        height,
        resolution_levels,
        derivable_levels: derivable_levels(width, height, resolution_levels),
        quality_layers: u32::from(codestream.quality_layers),
        compositing_layer_count,
        bit_depth,
        channel_count,
        embedded_xml_documents,
        source_format,
    })
}
