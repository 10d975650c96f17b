//! Pixel codec backend.
//!
//! The backend turns a source image and a resolved [`ExtractionPlan`] into
//! encoded derivative bytes. It is the only part of the crate that touches
//! pixels.
//!
//! # Pipeline
//!
//! ```text
//! source.jp2 --decode(reduce r)--> crop --> resize --> rotate --> quality --> encode
//! ```
//!
//! # Design Decisions
//!
//! - **Backend trait**: [`CodecBackend`] is the seam for substituting another
//!   JPEG 2000 codec; the server holds an `Arc<dyn CodecBackend>`.
//!
//! - **Reduction in the decoder**: discarding resolution levels happens inside
//!   OpenJPEG, so a reduced request never decodes full resolution.
//!
//! - **Encoders**: JPEG, PNG, GIF and TIFF come from the `image` crate. JP2
//!   and PDF output are advertised but not produced by this backend.

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma};

use crate::error::CodecError;
use crate::plan::ExtractionPlan;
use crate::request::{OutputFormat, Quality, Rotation};

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Luma threshold for bitonal output.
const BITONAL_THRESHOLD: u8 = 128;

// =============================================================================
// Backend Trait
// =============================================================================

/// Renders derivatives from source images.
///
/// Implementations are blocking; callers run them on a blocking thread.
pub trait CodecBackend: Send + Sync {
    /// Render `plan` from the image at `source` as `format`.
    fn render(
        &self,
        source: &Path,
        plan: &ExtractionPlan,
        format: OutputFormat,
    ) -> Result<Bytes, CodecError>;

    /// Whether this backend can produce `format`.
    fn supports(&self, format: OutputFormat) -> bool;
}

// =============================================================================
// OpenJPEG Backend
// =============================================================================

/// Backend built on OpenJPEG (via `jpeg2k`) for decoding and `image` for the
/// rest of the pipeline.
#[derive(Debug, Clone)]
pub struct OpenJpegBackend {
    jpeg_quality: u8,
}

impl OpenJpegBackend {
    pub fn new() -> Self {
        Self::with_quality(DEFAULT_JPEG_QUALITY)
    }

    /// Create a backend encoding JPEG output at `quality` (clamped to 1-100).
    pub fn with_quality(quality: u8) -> Self {
        Self {
            jpeg_quality: clamp_quality(quality),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Decode `source`, discarding `reduction` resolution levels.
    pub fn decode(&self, source: &Path, reduction: u32) -> Result<DynamicImage, CodecError> {
        let data = std::fs::read(source).map_err(|e| CodecError::Decode {
            message: format!("{}: {}", source.display(), e),
        })?;

        let params = jpeg2k::DecodeParameters::new().reduce(reduction);
        let image = jpeg2k::Image::from_bytes_with(&data, params).map_err(|e| {
            CodecError::Decode {
                message: e.to_string(),
            }
        })?;

        let components = image.components();
        let planes: Vec<Plane<'_>> = components
            .iter()
            .map(|c| Plane {
                width: c.width(),
                height: c.height(),
                precision: c.precision(),
                data: c.data(),
            })
            .collect();

        planes_to_image(&planes)
    }
}

impl Default for OpenJpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecBackend for OpenJpegBackend {
    fn render(
        &self,
        source: &Path,
        plan: &ExtractionPlan,
        format: OutputFormat,
    ) -> Result<Bytes, CodecError> {
        if !self.supports(format) {
            return Err(CodecError::UnsupportedOutput(format.mime_type()));
        }
        let decoded = self.decode(source, plan.reduction_factor)?;
        let derivative = apply_plan(decoded, plan);
        encode(&derivative, format, self.jpeg_quality)
    }

    fn supports(&self, format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jp2 | OutputFormat::Pdf)
    }
}

// =============================================================================
// Pixel Conversion
// =============================================================================

/// One decoded component plane.
struct Plane<'a> {
    width: u32,
    height: u32,
    precision: u32,
    data: &'a [i32],
}

impl Plane<'_> {
    fn sample(&self, index: usize) -> u8 {
        let value = self.data.get(index).copied().unwrap_or(0).max(0) as u32;
        let scaled = if self.precision > 8 {
            value >> (self.precision - 8)
        } else if self.precision < 8 && self.precision > 0 {
            value << (8 - self.precision)
        } else {
            value
        };
        scaled.min(255) as u8
    }
}

/// Interleave component planes into an 8-bit image.
fn planes_to_image(planes: &[Plane<'_>]) -> Result<DynamicImage, CodecError> {
    let first = planes.first().ok_or_else(|| CodecError::Decode {
        message: "image has no components".to_string(),
    })?;
    let (width, height) = (first.width, first.height);

    let channels = planes.len().min(4);
    if planes[..channels]
        .iter()
        .any(|p| p.width != width || p.height != height)
    {
        return Err(CodecError::Decode {
            message: "subsampled components are not supported".to_string(),
        });
    }

    let pixel_count = width as usize * height as usize;
    let mut buffer = Vec::with_capacity(pixel_count * channels);
    for i in 0..pixel_count {
        for plane in &planes[..channels] {
            buffer.push(plane.sample(i));
        }
    }

    let too_small = || CodecError::Decode {
        message: "component data shorter than its dimensions".to_string(),
    };
    let image = match channels {
        1 => DynamicImage::ImageLuma8(
            ImageBuffer::from_raw(width, height, buffer).ok_or_else(too_small)?,
        ),
        2 => DynamicImage::ImageLumaA8(
            ImageBuffer::from_raw(width, height, buffer).ok_or_else(too_small)?,
        ),
        3 => DynamicImage::ImageRgb8(
            ImageBuffer::from_raw(width, height, buffer).ok_or_else(too_small)?,
        ),
        _ => DynamicImage::ImageRgba8(
            ImageBuffer::from_raw(width, height, buffer).ok_or_else(too_small)?,
        ),
    };
    Ok(image)
}

// =============================================================================
// Plan Application
// =============================================================================

/// Crop, resize, rotate and recolour a decoded (already reduced) image.
pub fn apply_plan(mut image: DynamicImage, plan: &ExtractionPlan) -> DynamicImage {
    if let Some(region) = &plan.region {
        let (width, height) = (image.width(), image.height());
        let x = ((region.left * f64::from(width)).round() as u32).min(width.saturating_sub(1));
        let y = ((region.top * f64::from(height)).round() as u32).min(height.saturating_sub(1));
        let w = plan.extract_width.min(width - x).max(1);
        let h = plan.extract_height.min(height - y).max(1);
        image = image.crop_imm(x, y, w, h);
    }

    if (image.width(), image.height()) != (plan.output_width, plan.output_height) {
        image = image.resize_exact(plan.output_width, plan.output_height, FilterType::Lanczos3);
    }

    image = match plan.rotation {
        Rotation::Deg0 => image,
        Rotation::Deg90 => image.rotate90(),
        Rotation::Deg180 => image.rotate180(),
        Rotation::Deg270 => image.rotate270(),
    };

    match plan.quality {
        Quality::Native => image,
        Quality::Color => DynamicImage::ImageRgb8(image.to_rgb8()),
        Quality::Grey => DynamicImage::ImageLuma8(image.to_luma8()),
        Quality::Bitonal => DynamicImage::ImageLuma8(bitonal(&image.to_luma8())),
    }
}

fn bitonal(grey: &GrayImage) -> GrayImage {
    GrayImage::from_fn(grey.width(), grey.height(), |x, y| {
        let Luma([value]) = *grey.get_pixel(x, y);
        Luma([if value >= BITONAL_THRESHOLD { 255 } else { 0 }])
    })
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a derivative.
pub fn encode(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Bytes, CodecError> {
    let encode_err = |e: image::ImageError| CodecError::Encode {
        message: e.to_string(),
    };

    let mut output = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut output, clamp_quality(quality));
            // JPEG has no alpha channel
            if image.color().has_color() {
                encoder.encode_image(&image.to_rgb8()).map_err(encode_err)?;
            } else {
                encoder.encode_image(&image.to_luma8()).map_err(encode_err)?;
            }
        }
        OutputFormat::Png => write_with(image, ImageFormat::Png, &mut output).map_err(encode_err)?,
        OutputFormat::Gif => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            write_with(&rgba, ImageFormat::Gif, &mut output).map_err(encode_err)?
        }
        OutputFormat::Tiff => write_with(image, ImageFormat::Tiff, &mut output).map_err(encode_err)?,
        OutputFormat::Jp2 | OutputFormat::Pdf => {
            return Err(CodecError::UnsupportedOutput(format.mime_type()))
        }
    }

    Ok(Bytes::from(output))
}

fn write_with(
    image: &DynamicImage,
    format: ImageFormat,
    output: &mut Vec<u8>,
) -> Result<(), image::ImageError> {
    image.write_to(&mut Cursor::new(output), format)
}

/// Validate JPEG quality parameter.
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
