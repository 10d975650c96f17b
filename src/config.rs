//! Configuration management for JP2 Streamer.
//!
//! This module provides the command-line interface:
//! - Command-line arguments via clap
//! - Environment variables with `JP2_` prefix for the server settings
//! - Sensible defaults for all optional settings
//!
//! # Commands
//!
//! - `serve`: run the HTTP server
//! - `info <file>`: print the metadata of one JPEG 2000 file
//! - `pyramid <file>`: print the deep-zoom tile plan of one file
//!
//! # Environment Variables
//!
//! - `JP2_HOST` - Server bind address (default: 0.0.0.0)
//! - `JP2_PORT` - Server port (default: 3000)
//! - `JP2_IMAGE_ROOT` - Directory holding source images (required)
//! - `JP2_CACHE_DIR` - Directory for rendered derivatives (default: ./jp2-cache)
//! - `JP2_CACHE_TILES` - Max derivatives to keep (default: 1000)
//! - `JP2_CACHE_IMAGES` - Max image descriptors to keep (default: 100)
//! - `JP2_TILE_SIZE` - Tile size advertised to viewers (default: 256)
//! - `JP2_JPEG_QUALITY` - JPEG output quality (default: 80)
//! - `JP2_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `JP2_CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::plan::DEFAULT_TILE_SIZE;
use crate::server::routes::DEFAULT_CACHE_MAX_AGE;
use crate::source::DEFAULT_DESCRIPTOR_CACHE_CAPACITY;
use crate::tile::{DEFAULT_JPEG_QUALITY, DEFAULT_TILE_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default derivative cache directory.
pub const DEFAULT_CACHE_DIR: &str = "./jp2-cache";

/// Smallest tile size accepted.
pub const MIN_TILE_SIZE: u32 = 16;

/// Largest tile size accepted.
pub const MAX_TILE_SIZE: u32 = 4096;

// =============================================================================
// CLI Arguments
// =============================================================================

/// JP2 Streamer - An image server for JPEG 2000 collections.
///
/// Serves regions, scales and rotations of JPEG 2000 masters through the IIIF
/// Image API and the legacy resolver query syntax.
#[derive(Parser, Debug, Clone)]
#[command(name = "jp2-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Print the metadata of a JPEG 2000 file.
    Info(InfoConfig),

    /// Print the deep-zoom tile plan of a JPEG 2000 file.
    Pyramid(PyramidConfig),
}

// =============================================================================
// Serve Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "JP2_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "JP2_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding the source images; identifiers are paths below it.
    #[arg(long, env = "JP2_IMAGE_ROOT")]
    pub image_root: PathBuf,

    /// Directory where rendered derivatives are written.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "JP2_CACHE_DIR")]
    pub cache_dir: PathBuf,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of rendered derivatives kept on disk.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "JP2_CACHE_TILES")]
    pub cache_tiles: usize,

    /// Maximum number of parsed image descriptors kept in memory.
    #[arg(long, default_value_t = DEFAULT_DESCRIPTOR_CACHE_CAPACITY, env = "JP2_CACHE_IMAGES")]
    pub cache_images: usize,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// Tile size advertised in IIIF info.json.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "JP2_TILE_SIZE")]
    pub tile_size: u32,

    /// JPEG quality for derivative encoding (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "JP2_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "JP2_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "JP2_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.image_root.as_os_str().is_empty() {
            return Err(
                "Image root is required. Set --image-root or JP2_IMAGE_ROOT".to_string(),
            );
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".to_string());
        }

        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }
        if self.cache_images == 0 {
            return Err("cache_images must be greater than 0".to_string());
        }

        if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.tile_size) {
            return Err(format!(
                "tile_size must be between {} and {}",
                MIN_TILE_SIZE, MAX_TILE_SIZE
            ));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Info Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// JPEG 2000 file (JP2 or bare codestream).
    pub file: PathBuf,

    /// Print the full descriptor as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

// =============================================================================
// Pyramid Command
// =============================================================================

/// How `pyramid` prints each tile.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PyramidOutputFormat {
    /// `level scale region` columns
    #[default]
    Text,

    /// Legacy query strings, one per line
    Query,

    /// One JSON array
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct PyramidConfig {
    /// JPEG 2000 file (JP2 or bare codestream).
    pub file: PathBuf,

    /// Edge length of grid tiles.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_size: u32,

    /// Output format.
    #[arg(long, value_enum, default_value_t = PyramidOutputFormat::Text)]
    pub format: PyramidOutputFormat,
}

impl PyramidConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.tile_size) {
            return Err(format!(
                "tile_size must be between {} and {}",
                MIN_TILE_SIZE, MAX_TILE_SIZE
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
