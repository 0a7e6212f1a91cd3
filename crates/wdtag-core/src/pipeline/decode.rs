//! Image reading, validation and decoding.
//!
//! Each file is read once; the same bytes feed the size check, the magic-byte
//! check, the content hash and the decoder.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

use super::hash::Hasher;

/// Image decoder with configurable limits.
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// BLAKE3 hash of the file bytes
    pub content_hash: String,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read, validate and decode an image file.
    pub fn decode_file(&self, path: &Path) -> Result<DecodedImage, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let max_bytes = self.limits.max_file_size_mb.saturating_mul(1024 * 1024);
        let size = std::fs::metadata(path)
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot read metadata: {e}"),
            })?
            .len();
        if size > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: size / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let bytes = std::fs::read(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read file: {e}"),
        })?;
        self.decode_bytes(&bytes, path)
    }

    /// Validate and decode an in-memory image.
    pub fn decode_bytes(&self, bytes: &[u8], path: &Path) -> Result<DecodedImage, PipelineError> {
        if !has_image_signature(bytes) {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }

        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {e}"),
            })?;
        let format = match reader.format() {
            Some(f) => f,
            None => ImageFormat::from_path(path).map_err(|_| PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            })?,
        };
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim,
            });
        }

        Ok(DecodedImage {
            image,
            format,
            width,
            height,
            content_hash: Hasher::content_hash_from_bytes(bytes),
        })
    }
}

/// Check the leading bytes against known raster signatures.
fn has_image_signature(bytes: &[u8]) -> bool {
    const SIGNATURES: &[&[u8]] = &[
        &[0xFF, 0xD8, 0xFF],                      // JPEG
        &[0x89, b'P', b'N', b'G'],                // PNG
        b"GIF8",                                  // GIF
        b"BM",                                    // BMP
        &[b'I', b'I', 0x2A, 0x00],                // TIFF little-endian
        &[b'M', b'M', 0x00, 0x2A],                // TIFF big-endian
    ];
    if SIGNATURES.iter().any(|sig| bytes.starts_with(sig)) {
        return true;
    }
    // WebP: RIFF....WEBP
    bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP"
}
