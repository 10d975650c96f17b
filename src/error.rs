use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while walking the JP2 box/marker structure.
///
/// Any of these aborts the parse; no partially populated descriptor is ever
/// returned.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// Reading the underlying stream failed
    #[error("I/O error: {0}")]
    Io(String),

    /// The first box is not the 12-byte JP2 signature box
    #[error("Not a JP2 file: {reason}")]
    NotJp2 { reason: String },

    /// A box other than the expected one was found
    #[error("Unexpected box: expected '{expected}', found '{found}'")]
    UnexpectedBox { expected: String, found: String },

    /// A codestream marker other than the expected one was found
    #[error("Unexpected marker: expected {expected}, found 0x{found:04X}")]
    UnexpectedMarker { expected: &'static str, found: u16 },

    /// Data ended before a field could be read
    #[error("Truncated stream: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// An extended (XL) box length does not fit in 32 bits
    #[error("Box length too large: '{box_type}' declares a 64-bit length")]
    BoxTooLarge { box_type: String },

    /// A box declares a length smaller than its own header
    #[error("Invalid length {length} for box '{box_type}'")]
    InvalidBoxLength { box_type: String, length: u64 },

    /// A marker segment declares a length smaller than its own length field
    #[error("Invalid {marker} segment length: {length}")]
    InvalidSegmentLength { marker: &'static str, length: u16 },

    /// The codestream was never reached
    #[error("No codestream found")]
    MissingCodestream,

    /// Width or height is zero
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

impl From<std::io::Error> for FormatError {
    fn from(err: std::io::Error) -> Self {
        FormatError::Io(err.to_string())
    }
}

/// Errors raised while parsing a client request (legacy or IIIF syntax).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// IIIF path does not have the expected number of segments
    #[error("Invalid path: expected {expected} segments, got {found}")]
    SegmentCount { expected: usize, found: usize },

    /// A numeric field could not be parsed
    #[error("Invalid number in {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    /// A field parsed but is outside its allowed domain
    #[error("Invalid {field}: {message}")]
    OutOfDomain { field: &'static str, message: String },

    /// Unknown quality keyword
    #[error("Invalid quality: '{0}' (expected native, color, grey or bitonal)")]
    InvalidQuality(String),

    /// Unknown or unsupported output format
    #[error("Unsupported output format: '{0}'")]
    InvalidFormat(String),

    /// Two parameters that cannot be combined were both supplied
    #[error("Conflicting parameters: {0}")]
    Conflict(String),

    /// A required parameter is missing
    #[error("Missing parameter: {0}")]
    Missing(&'static str),
}

/// Errors raised while turning a request into an extraction plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// A pixel region inset lies outside the native image
    #[error("Region inset out of bounds: {axis} {inset} > {dimension}")]
    RegionOutOfBounds {
        axis: &'static str,
        inset: u32,
        dimension: u32,
    },
}

/// Failure to delete an evicted or removed cache artifact.
///
/// Logged by the cache, never returned to callers.
#[derive(Debug, Error)]
#[error("Failed to delete cache artifact {path}: {source}")]
pub struct CacheError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Errors from mapping an identifier to a source image.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// No image exists for the identifier
    #[error("Image not found: {0}")]
    NotFound(String),

    /// The identifier is not acceptable (e.g. escapes the image root)
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The source image exists but is not a readable JPEG 2000 file
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Reading the source failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors from the pixel codec backend.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The JPEG 2000 decoder failed
    #[error("Failed to decode source image: {message}")]
    Decode { message: String },

    /// The output encoder failed
    #[error("Failed to encode derivative: {message}")]
    Encode { message: String },

    /// The backend cannot produce this output type
    #[error("Output format not supported by codec: {0}")]
    UnsupportedOutput(&'static str),
}

/// Errors from the derivative service pipeline.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Writing or reading a cache artifact failed
    #[error("Cache I/O error: {0}")]
    CacheIo(String),
}
