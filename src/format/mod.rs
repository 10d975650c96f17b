//! Format parsers for JPEG 2000 sources.
//!
//! Only metadata is read here; pixel decoding is left to the codec backend.
//!
//! # Format Detection
//!
//! Use [`detect::detect_source_format`] to identify the container kind.
//! Supported inputs:
//!
//! - **JP2**: box-wrapped files, starting with the signature box
//! - **J2K**: bare codestreams, starting with the SOC marker

pub mod cursor;
pub mod detect;
pub mod jp2;

pub use detect::{detect_source_format, is_codestream_start, is_jp2_signature, SourceFormat};
pub use jp2::{extract, extract_from_path, parse_descriptor, ImageDescriptor};
