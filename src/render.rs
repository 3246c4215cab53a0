//! Render detector images to PNG for a quick look.

use anyhow::{Context, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, Rgb, RgbImage};
use nalgebra::DMatrix;
use std::path::Path;

/// Display options for [`render_png`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Lower and upper percentiles of the finite pixels mapped to black and white.
    pub percentiles: (f64, f64),
    /// Colour drawn over masked pixels.
    pub mask_color: Rgb<u8>,
    /// Longest side of the output; larger images are downsampled.
    pub max_size: Option<u32>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            percentiles: (1.0, 99.5),
            mask_color: Rgb([255, 0, 0]),
            max_size: Some(2000),
        }
    }
}

/// Value at percentile `q` (0-100) of the finite values, by linear
/// interpolation between the sorted samples.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let pos = (q.clamp(0.0, 100.0) / 100.0) * (finite.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(finite[lo] + (finite[hi] - finite[lo]) * frac)
}

/// Linear stretch between the option percentiles, with masked pixels in
/// the mask colour. Row 0 of the image is the top row of the output.
pub fn stretch(
    image: &DMatrix<f64>,
    mask: Option<&DMatrix<bool>>,
    options: &RenderOptions,
) -> RgbImage {
    let (nrows, ncols) = image.shape();
    let lo = percentile(image.as_slice(), options.percentiles.0).unwrap_or(0.0);
    let hi = percentile(image.as_slice(), options.percentiles.1).unwrap_or(1.0);
    let range = if hi > lo { hi - lo } else { 1.0 };

    RgbImage::from_fn(ncols as u32, nrows as u32, |x, y| {
        let (r, c) = (y as usize, x as usize);
        if mask.is_some_and(|m| m[(r, c)]) {
            return options.mask_color;
        }
        let v = image[(r, c)];
        let level = if v.is_finite() {
            (((v - lo) / range).clamp(0.0, 1.0) * 255.0).round() as u8
        } else {
            0
        };
        Rgb([level, level, level])
    })
}

/// Stretch and write `image` as a PNG.
pub fn render_png(
    image: &DMatrix<f64>,
    mask: Option<&DMatrix<bool>>,
    path: &Path,
    options: &RenderOptions,
) -> Result<()> {
    let rgb = stretch(image, mask, options);
    let (width, height) = rgb.dimensions();
    let rgb = match options.max_size {
        Some(max) if width > max || height > max => {
            let aspect_ratio = width as f32 / height as f32;
            let (new_width, new_height) = if width > height {
                (max, ((max as f32 / aspect_ratio) as u32).max(1))
            } else {
                (((max as f32 * aspect_ratio) as u32).max(1), max)
            };
            image::imageops::resize(
                &rgb,
                new_width,
                new_height,
                image::imageops::FilterType::Triangle,
            )
        }
        _ => rgb,
    };

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create PNG: {}", path.display()))?;
    let writer = std::io::BufWriter::new(file);
    let encoder = PngEncoder::new_with_quality(writer, CompressionType::Best, FilterType::Adaptive);
    let (width, height) = rgb.dimensions();
    encoder
        .write_image(&rgb, width, height, ColorType::Rgb8.into())
        .with_context(|| format!("Failed to write PNG: {}", path.display()))?;
    tracing::info!("🖼️  Wrote {}x{} PNG to {}", width, height, path.display());
    Ok(())
}
