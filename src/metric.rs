//! Frame similarity metrics.
//!
//! Four full-reference metrics are supported. Each one pairs a scoring
//! function with a fixed [`Direction`] saying whether smaller or larger
//! scores mean "more similar":
//!
//! | Metric | Direction | Identical frames |
//! |--------|-----------|------------------|
//! | [`Metric::Mse`] | lower is better | `0.0` |
//! | [`Metric::Nrmse`] | lower is better | `0.0` |
//! | [`Metric::Psnr`] | higher is better | `+∞` |
//! | [`Metric::Ssim`] | higher is better | `1.0` |
//!
//! # Example
//!
//! ```
//! use image::{GrayImage, Luma};
//! use seamfind::{Frame, Metric};
//!
//! let dark = Frame::Gray(GrayImage::from_pixel(16, 16, Luma([10])));
//! let light = Frame::Gray(GrayImage::from_pixel(16, 16, Luma([20])));
//!
//! let metric: Metric = "mse".parse()?;
//! assert_eq!(metric.score(&dark, &light)?, 100.0);
//! assert!(metric.is_better(0.0, 100.0));
//! # Ok::<(), seamfind::SeamError>(())
//! ```

use std::{fmt, str::FromStr};

use crate::error::SeamError;
use crate::frame::Frame;

/// Largest sample value of an 8-bit frame.
const DATA_RANGE: f64 = 255.0;

/// Standard deviation of the SSIM Gaussian window.
const SSIM_SIGMA: f64 = 1.5;
/// The SSIM window is truncated at this many standard deviations.
const SSIM_TRUNCATE: f64 = 3.5;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

/// Whether smaller or larger scores indicate a better match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Error metrics: 0 is a perfect match.
    LowerIsBetter,
    /// Similarity metrics: larger is closer.
    HigherIsBetter,
}

/// A similarity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Metric {
    /// Mean squared error.
    #[default]
    Mse,
    /// Root mean squared error normalised by the reference frame's range.
    Nrmse,
    /// Peak signal-to-noise ratio in decibels.
    Psnr,
    /// Gaussian-weighted structural similarity index.
    Ssim,
}

impl Metric {
    /// Every supported metric.
    pub const ALL: [Metric; 4] = [Metric::Mse, Metric::Nrmse, Metric::Psnr, Metric::Ssim];

    /// Lower-case name as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Metric::Mse => "mse",
            Metric::Nrmse => "nrmse",
            Metric::Psnr => "psnr",
            Metric::Ssim => "ssim",
        }
    }

    /// Whether this metric is minimised or maximised.
    pub fn direction(self) -> Direction {
        match self {
            Metric::Mse | Metric::Nrmse => Direction::LowerIsBetter,
            Metric::Psnr | Metric::Ssim => Direction::HigherIsBetter,
        }
    }

    /// The worst possible score, so that any real score replaces it.
    pub fn initial_best(self) -> f64 {
        match self.direction() {
            Direction::LowerIsBetter => f64::INFINITY,
            Direction::HigherIsBetter => f64::NEG_INFINITY,
        }
    }

    /// Returns `true` if `candidate` is strictly better than `current`.
    ///
    /// Equal scores are never better, so the first occurrence wins ties.
    pub fn is_better(self, candidate: f64, current: f64) -> bool {
        match self.direction() {
            Direction::LowerIsBetter => candidate < current,
            Direction::HigherIsBetter => candidate > current,
        }
    }

    /// Score `candidate` against `reference`.
    ///
    /// `reference` matters only for [`Metric::Nrmse`], which normalises by
    /// the reference frame's sample range.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::FrameMismatch`] if the frames differ in size or
    /// channel count.
    pub fn score(self, reference: &Frame, candidate: &Frame) -> Result<f64, SeamError> {
        reference.ensure_same_geometry(candidate)?;
        Ok(match self {
            Metric::Mse => mean_squared_error(reference.samples(), candidate.samples()),
            Metric::Nrmse => normalized_root_mse(reference.samples(), candidate.samples()),
            Metric::Psnr => peak_signal_noise_ratio(reference.samples(), candidate.samples()),
            Metric::Ssim => structural_similarity(reference, candidate),
        })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = SeamError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mse" => Ok(Metric::Mse),
            "nrmse" => Ok(Metric::Nrmse),
            "psnr" => Ok(Metric::Psnr),
            "ssim" => Ok(Metric::Ssim),
            _ => Err(SeamError::UnknownMetric(name.to_string())),
        }
    }
}

fn mean_squared_error(reference: &[u8], candidate: &[u8]) -> f64 {
    if reference.is_empty() {
        return 0.0;
    }
    let sum: u64 = reference
        .iter()
        .zip(candidate)
        .map(|(&a, &b)| {
            let difference = i64::from(a) - i64::from(b);
            (difference * difference) as u64
        })
        .sum();
    sum as f64 / reference.len() as f64
}

fn normalized_root_mse(reference: &[u8], candidate: &[u8]) -> f64 {
    let (min, max) = reference
        .iter()
        .fold((u8::MAX, u8::MIN), |(min, max), &value| {
            (min.min(value), max.max(value))
        });
    // Flat reference frames fall back to the full sample range.
    let range = if max > min {
        f64::from(max - min)
    } else {
        DATA_RANGE
    };
    mean_squared_error(reference, candidate).sqrt() / range
}

fn peak_signal_noise_ratio(reference: &[u8], candidate: &[u8]) -> f64 {
    let mse = mean_squared_error(reference, candidate);
    if mse == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (DATA_RANGE * DATA_RANGE / mse).log10()
}

fn structural_similarity(reference: &Frame, candidate: &Frame) -> f64 {
    let width = reference.width() as usize;
    let height = reference.height() as usize;
    let channels = usize::from(reference.channels());
    if width == 0 || height == 0 {
        return 1.0;
    }

    let kernel = gaussian_kernel();
    let pad = kernel.len() / 2;
    let total: f64 = (0..channels)
        .map(|channel| {
            let map = ssim_plane(
                &plane(reference.samples(), channels, channel),
                &plane(candidate.samples(), channels, channel),
                width,
                height,
                &kernel,
            );
            cropped_mean(&map, width, height, pad)
        })
        .sum();
    total / channels as f64
}

/// Per-pixel SSIM between two frames, averaged over channels.
///
/// The map has one value per pixel in row-major order and uses the same
/// window and constants as [`Metric::Ssim`]. Border pixels are included.
///
/// # Errors
///
/// Returns [`SeamError::FrameMismatch`] if the frames differ in size or
/// channel count.
pub fn ssim_map(reference: &Frame, candidate: &Frame) -> Result<Vec<f64>, SeamError> {
    reference.ensure_same_geometry(candidate)?;
    let width = reference.width() as usize;
    let height = reference.height() as usize;
    let channels = usize::from(reference.channels());
    let kernel = gaussian_kernel();

    let mut averaged = vec![0.0; width * height];
    for channel in 0..channels {
        let map = ssim_plane(
            &plane(reference.samples(), channels, channel),
            &plane(candidate.samples(), channels, channel),
            width,
            height,
            &kernel,
        );
        for (sum, value) in averaged.iter_mut().zip(map) {
            *sum += value;
        }
    }
    for value in &mut averaged {
        *value /= channels as f64;
    }
    Ok(averaged)
}

/// De-interleave one channel into floating point samples.
fn plane(samples: &[u8], channels: usize, channel: usize) -> Vec<f64> {
    samples
        .iter()
        .skip(channel)
        .step_by(channels)
        .map(|&value| f64::from(value))
        .collect()
}

/// Normalised 1-D Gaussian taps, `2 * radius + 1` long.
fn gaussian_kernel() -> Vec<f64> {
    let radius = (SSIM_TRUNCATE * SSIM_SIGMA + 0.5) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|offset| {
            let x = offset as f64;
            (-(x * x) / (2.0 * SSIM_SIGMA * SSIM_SIGMA)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|weight| weight / sum).collect()
}

/// Map an out-of-range index back into `0..len` by mirroring about the edge
/// (the edge sample is repeated: `d c b a | a b c d | d c b a`).
fn reflect(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let folded = index.rem_euclid(period);
    if folded < len as isize {
        folded as usize
    } else {
        (period - 1 - folded) as usize
    }
}

/// Separable Gaussian filter with reflected borders.
fn gaussian_filter(input: &[f64], width: usize, height: usize, kernel: &[f64]) -> Vec<f64> {
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0.0; input.len()];
    for y in 0..height {
        let row = &input[y * width..(y + 1) * width];
        for x in 0..width {
            horizontal[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(tap, weight)| {
                    weight * row[reflect(x as isize + tap as isize - radius, width)]
                })
                .sum();
        }
    }

    let mut output = vec![0.0; input.len()];
    for y in 0..height {
        for x in 0..width {
            output[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(tap, weight)| {
                    let source_y = reflect(y as isize + tap as isize - radius, height);
                    weight * horizontal[source_y * width + x]
                })
                .sum();
        }
    }
    output
}

fn ssim_plane(x: &[f64], y: &[f64], width: usize, height: usize, kernel: &[f64]) -> Vec<f64> {
    let product = |a: &[f64], b: &[f64]| -> Vec<f64> { a.iter().zip(b).map(|(p, q)| p * q).collect() };

    let ux = gaussian_filter(x, width, height, kernel);
    let uy = gaussian_filter(y, width, height, kernel);
    let uxx = gaussian_filter(&product(x, x), width, height, kernel);
    let uyy = gaussian_filter(&product(y, y), width, height, kernel);
    let uxy = gaussian_filter(&product(x, y), width, height, kernel);

    let c1 = (SSIM_K1 * DATA_RANGE).powi(2);
    let c2 = (SSIM_K2 * DATA_RANGE).powi(2);

    (0..x.len())
        .map(|i| {
            let vx = uxx[i] - ux[i] * ux[i];
            let vy = uyy[i] - uy[i] * uy[i];
            let vxy = uxy[i] - ux[i] * uy[i];
            let numerator = (2.0 * ux[i] * uy[i] + c1) * (2.0 * vxy + c2);
            let denominator = (ux[i] * ux[i] + uy[i] * uy[i] + c1) * (vx + vy + c2);
            numerator / denominator
        })
        .collect()
}

/// Mean of `map` excluding a `pad`-pixel border. Frames too small to crop
/// are averaged whole.
fn cropped_mean(map: &[f64], width: usize, height: usize, pad: usize) -> f64 {
    if width <= 2 * pad || height <= 2 * pad {
        return map.iter().sum::<f64>() / map.len() as f64;
    }
    let mut sum = 0.0;
    let mut count = 0usize;
    for y in pad..height - pad {
        for value in &map[y * width + pad..y * width + width - pad] {
            sum += value;
            count += 1;
        }
    }
    sum / count as f64
}
