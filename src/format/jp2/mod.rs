//! JPEG 2000 (JP2 / J2K) metadata reading.
//!
//! ```text
//! +-----------+     +-----------+     +----------------+
//! |  boxes    | --> | codestream| --> |  descriptor    |
//! | (jP, ftyp,|     | (SOC, SIZ,|     | (levels, dims, |
//! |  jp2h...) |     |  CAP, COD)|     |  layers, xml)  |
//! +-----------+     +-----------+     +----------------+
//! ```
//!
//! [`extract`] and [`parse_descriptor`] are the entry points; the submodules
//! expose the lower-level readers for tests and tools.

pub mod boxes;
pub mod codestream;
pub mod descriptor;
pub mod extractor;

pub use boxes::{BoxHeader, BoxType};
pub use codestream::CodestreamHeader;
pub use descriptor::{derivable_levels, max_level, ImageDescriptor, MIN_DERIVABLE_DIMENSION};
pub use extractor::{extract, extract_from_path, parse_descriptor};
