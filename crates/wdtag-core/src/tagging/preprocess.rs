//! Image preprocessing for WD tagger inference.
//!
//! WD tagger models expect:
//! - Input size: `target_size × target_size` (448 for the v3 family)
//! - Square letterboxing on a solid background, no cropping or stretching
//! - Channel order: BGR
//! - Values: raw 0–255 floats, no normalization
//! - Tensor layout: NHWC [batch, height, width, channels]

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

use crate::config::TaggerConfig;
use crate::error::PipelineError;

/// Number of color channels.
const CHANNELS: usize = 3;

/// NHWC float tensor of shape (1, size, size, 3), BGR, values in 0–255.
pub type PreparedTensor = Array4<f32>;

/// Converts decoded images into model input tensors.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    target_size: u32,
    pad_color: [u8; 3],
}

impl Preprocessor {
    pub fn new(target_size: u32, pad_color: [u8; 3]) -> Self {
        Self {
            target_size,
            pad_color,
        }
    }

    pub fn from_config(config: &TaggerConfig) -> Self {
        Self::new(config.target_size, config.pad_color)
    }

    /// Prepare an image as-is.
    pub fn prepare(&self, image: &DynamicImage) -> Result<PreparedTensor, PipelineError> {
        prepare(image, self.target_size, self.pad_color)
    }

    /// Prepare a horizontally mirrored copy of the image (TTA pass).
    pub fn prepare_flipped(&self, image: &DynamicImage) -> Result<PreparedTensor, PipelineError> {
        prepare(&image.fliph(), self.target_size, self.pad_color)
    }
}

/// Flatten alpha onto a solid background, or convert straight to RGB.
///
/// Grayscale, palette and 16-bit images are expanded to 8-bit RGB first.
pub fn composite_on_background(image: &DynamicImage, background: [u8; 3]) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let alpha = src[3] as u32;
        for c in 0..CHANNELS {
            let fg = src[c] as u32 * alpha;
            let bg = background[c] as u32 * (255 - alpha);
            // Rounded integer blend
            dst[c] = ((fg + bg + 127) / 255) as u8;
        }
    }
    out
}

/// Centre the image on a square canvas of side `max(width, height)`.
pub fn pad_to_square(image: &RgbImage, background: [u8; 3]) -> RgbImage {
    let (width, height) = image.dimensions();
    let max_dim = width.max(height);
    if width == height {
        return image.clone();
    }

    let mut canvas = RgbImage::from_pixel(max_dim, max_dim, Rgb(background));
    let pad_left = (max_dim - width) / 2;
    let pad_top = (max_dim - height) / 2;
    imageops::replace(&mut canvas, image, pad_left as i64, pad_top as i64);
    canvas
}

/// Full preprocessing chain: composite, pad, resize, reorder to BGR, add batch.
pub fn prepare(
    image: &DynamicImage,
    target_size: u32,
    background: [u8; 3],
) -> Result<PreparedTensor, PipelineError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::Preprocess {
            message: format!("Image has zero dimension ({width}x{height})"),
        });
    }
    if target_size == 0 {
        return Err(PipelineError::Preprocess {
            message: "Target size must be > 0".to_string(),
        });
    }

    let rgb = composite_on_background(image, background);
    let padded = pad_to_square(&rgb, background);

    let square = if padded.width() != target_size {
        imageops::resize(&padded, target_size, target_size, FilterType::CatmullRom)
    } else {
        padded
    };

    let size = target_size as usize;
    let data: Vec<f32> = square
        .as_raw()
        .chunks_exact(CHANNELS)
        .flat_map(|px| [px[2] as f32, px[1] as f32, px[0] as f32])
        .collect();

    Array4::from_shape_vec((1, size, size, CHANNELS), data).map_err(|e| {
        PipelineError::Preprocess {
            message: format!("Cannot shape tensor: {e}"),
        }
    })
}
