//! Screenshot similarity for the early-exit check.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::GrayImage;
use image::imageops::{self, FilterType};

/// Scores how similar a screenshot is to a reference image, in `[-1, 1]`.
pub trait SimilarityScorer {
    fn score(&self, reference: &Path, candidate: &Path) -> Result<f64>;
}

const BLOCK: u32 = 8;
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Mean SSIM over non-overlapping 8x8 blocks of the grayscale images.
///
/// Both images are scaled to a common size no wider than `max_width`, keeping
/// the reference's aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct GraySsim {
    pub max_width: u32,
}

impl Default for GraySsim {
    fn default() -> Self {
        Self { max_width: 360 }
    }
}

impl SimilarityScorer for GraySsim {
    fn score(&self, reference: &Path, candidate: &Path) -> Result<f64> {
        let reference = load_gray(reference)?;
        let candidate = load_gray(candidate)?;
        let (width, height) = working_size(reference.dimensions(), self.max_width);
        if width == 0 || height == 0 {
            return Err(anyhow!("reference image is empty"));
        }
        let a = imageops::resize(&reference, width, height, FilterType::Triangle);
        let b = imageops::resize(&candidate, width, height, FilterType::Triangle);
        Ok(mean_block_ssim(&a, &b))
    }
}

fn load_gray(path: &Path) -> Result<GrayImage> {
    let img = image::open(path).with_context(|| format!("open image {}", path.display()))?;
    Ok(img.to_luma8())
}

fn working_size((width, height): (u32, u32), max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled = u64::from(height) * u64::from(max_width) / u64::from(width);
    (max_width, u32::try_from(scaled).unwrap_or(u32::MAX).max(1))
}

fn mean_block_ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    let (width, height) = a.dimensions();
    let block_w = BLOCK.min(width);
    let block_h = BLOCK.min(height);
    let mut total = 0.0;
    let mut blocks = 0u32;

    for y0 in (0..=height - block_h).step_by(block_h as usize) {
        for x0 in (0..=width - block_w).step_by(block_w as usize) {
            total += block_ssim(a, b, x0, y0, block_w, block_h);
            blocks += 1;
        }
    }
    if blocks == 0 {
        return 0.0;
    }
    total / f64::from(blocks)
}

fn block_ssim(a: &GrayImage, b: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> f64 {
    let n = f64::from(w * h);
    let (mut sum_a, mut sum_b) = (0.0, 0.0);
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            sum_a += f64::from(a.get_pixel(x, y)[0]);
            sum_b += f64::from(b.get_pixel(x, y)[0]);
        }
    }
    let (mean_a, mean_b) = (sum_a / n, sum_b / n);

    let (mut var_a, mut var_b, mut cov) = (0.0, 0.0, 0.0);
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            let da = f64::from(a.get_pixel(x, y)[0]) - mean_a;
            let db = f64::from(b.get_pixel(x, y)[0]) - mean_b;
            var_a += da * da;
            var_b += db * db;
            cov += da * db;
        }
    }
    var_a /= n;
    var_b /= n;
    cov /= n;

    ((2.0 * mean_a * mean_b + C1) * (2.0 * cov + C2))
        / ((mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2))
}
