//! Error types for the `seamfind` crate.
//!
//! This module defines [`SeamError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry the context needed to tell
//! a missing leading video apart from a search that simply found a poor
//! match: file paths, window sides, frame geometry, and upstream messages.

use std::{fmt, io::Error as IoError, path::PathBuf};

#[cfg(feature = "ffmpeg")]
use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// Which side of a search a frame window belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSide {
    /// The window taken from the end of the leading clip.
    Lead,
    /// The window taken from the start of a following clip.
    Follow,
}

impl fmt::Display for WindowSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowSide::Lead => f.write_str("leading"),
            WindowSide::Follow => f.write_str("following"),
        }
    }
}

/// The unified error type for all `seamfind` operations.
///
/// Every public method that can fail returns `Result<T, SeamError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeamError {
    /// A video source could not be opened.
    ///
    /// For the leading clip this aborts the whole matching call. Following
    /// clips that fail to open are reported per path instead.
    #[error("Failed to open video at {path}: {reason}")]
    SourceOpen {
        /// Path that was passed to the opener.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The metric name is not one of `mse`, `nrmse`, `psnr`, `ssim`.
    #[error("Unknown similarity metric '{0}' (expected one of: mse, nrmse, psnr, ssim)")]
    UnknownMetric(String),

    /// A search was started with no frames on one side.
    #[error("The {side} frame window is empty")]
    EmptyWindow {
        /// The side whose window had no frames.
        side: WindowSide,
    },

    /// Two frames entering the same comparison have different geometry.
    #[error(
        "Frame geometry mismatch: expected {expected_width}x{expected_height}x{expected_channels}, \
         found {found_width}x{found_height}x{found_channels}"
    )]
    FrameMismatch {
        /// Width of the reference frame.
        expected_width: u32,
        /// Height of the reference frame.
        expected_height: u32,
        /// Channel count of the reference frame.
        expected_channels: u8,
        /// Width of the offending frame.
        found_width: u32,
        /// Height of the offending frame.
        found_height: u32,
        /// Channel count of the offending frame.
        found_channels: u8,
    },

    /// A configuration value is out of range.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// Video encoding failed (codec could not be found or opened).
    #[error("Video encoding error: {0}")]
    VideoEncodeError(String),

    /// Writing frames to a video sink failed.
    #[error("Video write error: {0}")]
    VideoWriteError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while writing diagnostic images.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

#[cfg(feature = "ffmpeg")]
impl From<FfmpegError> for SeamError {
    fn from(error: FfmpegError) -> Self {
        SeamError::FfmpegError(error.to_string())
    }
}
