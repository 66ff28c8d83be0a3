//! Page image normalization ahead of local OCR.
//!
//! Fixed pipeline: grayscale, median denoise, projection-profile deskew,
//! histogram equalization, adaptive (local mean) binarization. Every step
//! is a pure function of its input.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::contrast::{adaptive_threshold, equalize_histogram};
use imageproc::filter::median_filter;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::error::PreprocessError;

/// Longest side of the downscaled copy used for skew estimation.
const SKEW_SAMPLE_DIM: u32 = 600;

#[derive(Debug, Clone)]
pub struct Preprocessor {
    /// Median filter radius in pixels.
    pub denoise_radius: u32,
    /// Largest skew (degrees, either direction) searched for.
    pub max_skew_deg: f32,
    pub skew_step_deg: f32,
    /// Half-size of the local window used for thresholding.
    pub threshold_radius: u32,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            denoise_radius: 1,
            max_skew_deg: 5.0,
            skew_step_deg: 0.5,
            threshold_radius: 15,
        }
    }
}

impl Preprocessor {
    /// Normalize a decoded page image.
    pub fn preprocess(&self, image: &DynamicImage) -> GrayImage {
        let gray = image.to_luma8();
        let denoised = self.denoise(&gray);
        let deskewed = self.deskew(&denoised);
        let enhanced = equalize_histogram(&deskewed);
        self.binarize(&enhanced)
    }

    /// Decode `input`, normalize it and write a PNG to `output`.
    pub fn preprocess_file(&self, input: &Path, output: &Path) -> Result<(), PreprocessError> {
        let decoded = image::open(input).map_err(|e| PreprocessError::Decode(e.to_string()))?;
        self.preprocess(&decoded)
            .save_with_format(output, ImageFormat::Png)
            .map_err(|e| PreprocessError::Encode(e.to_string()))
    }

    fn denoise(&self, gray: &GrayImage) -> GrayImage {
        if self.denoise_radius == 0 {
            return gray.clone();
        }
        median_filter(gray, self.denoise_radius, self.denoise_radius)
    }

    fn deskew(&self, gray: &GrayImage) -> GrayImage {
        let angle = self.estimate_skew(gray);
        if angle.abs() < self.skew_step_deg / 2.0 {
            return gray.clone();
        }
        tracing::debug!("Correcting page skew of {:.1} degrees", angle);
        rotate_about_center(
            gray,
            (-angle).to_radians(),
            Interpolation::Bilinear,
            Luma([255]),
        )
    }

    /// Skew angle in degrees maximizing the sharpness of the row ink profile.
    pub fn estimate_skew(&self, gray: &GrayImage) -> f32 {
        let (w, h) = gray.dimensions();
        if w < 8 || h < 8 || self.skew_step_deg <= 0.0 {
            return 0.0;
        }
        let sample = if w.max(h) > SKEW_SAMPLE_DIM {
            let scale = SKEW_SAMPLE_DIM as f32 / w.max(h) as f32;
            image::imageops::thumbnail(
                gray,
                ((w as f32 * scale) as u32).max(1),
                ((h as f32 * scale) as u32).max(1),
            )
        } else {
            gray.clone()
        };

        let steps = (self.max_skew_deg / self.skew_step_deg).round() as i32;
        let mut best_angle = 0.0f32;
        let mut best_score = profile_score(&sample);
        for step in -steps..=steps {
            if step == 0 {
                continue;
            }
            let angle = step as f32 * self.skew_step_deg;
            let rotated = rotate_about_center(
                &sample,
                (-angle).to_radians(),
                Interpolation::Nearest,
                Luma([255]),
            );
            let score = profile_score(&rotated);
            if score > best_score {
                best_score = score;
                best_angle = angle;
            }
        }
        best_angle
    }

    /// Local-mean thresholding: a pixel darker than the mean of its
    /// neighbourhood becomes ink.
    fn binarize(&self, gray: &GrayImage) -> GrayImage {
        adaptive_threshold(gray, self.threshold_radius.max(1))
    }
}

/// Sum of squared differences between adjacent row ink counts.
/// Text lines aligned with the x axis give the sharpest profile.
fn profile_score(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    let mut previous: Option<f64> = None;
    let mut score = 0.0;
    for y in 0..h {
        let ink = (0..w).filter(|&x| gray.get_pixel(x, y)[0] < 128).count() as f64;
        if let Some(prev) = previous {
            score += (ink - prev) * (ink - prev);
        }
        previous = Some(ink);
    }
    score
}
