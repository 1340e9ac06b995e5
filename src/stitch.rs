//! Joining two clips at a chosen seam.
//!
//! Once a seam is known (a frame in the leading clip and a frame in the
//! following clip), [`Stitcher`] reads a few seconds of video ending at the
//! leading frame and a few seconds starting at the following frame, and
//! writes them back to back through a [`VideoSink`]. It can also write four
//! diagnostic images for judging the seam by eye:
//!
//! * `first.jpg`: the last leading frame;
//! * `second.jpg`: the first following frame;
//! * `diff_abs.jpg`: their inverted absolute difference (white means equal);
//! * `diff_ssim.jpg`: the squared SSIM map (white means structurally equal).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use image::{Rgb, RgbImage};
//! use seamfind::{MemoryClip, MemoryOpener, MemorySink, Seam, StitchOptions, Stitcher};
//!
//! let clip = MemoryClip::from_fn(40, 10.0, |i| RgbImage::from_pixel(8, 8, Rgb([i as u8, 0, 0])));
//! let opener = MemoryOpener::new()
//!     .with_clip("a.mp4", clip.clone())
//!     .with_clip("b.mp4", clip);
//! let stitcher = Stitcher::with_opener(
//!     Arc::new(opener),
//!     StitchOptions::new().with_lead_seconds(1).with_follow_seconds(1),
//! )?;
//!
//! let clip = stitcher.collect(&Seam::new("a.mp4", 30, "b.mp4", 5))?;
//! let mut sink = MemorySink::new();
//! stitcher.write(&clip, &mut sink)?;
//! assert_eq!(sink.frames().len(), 20);
//! assert_eq!(sink.frames()[9].get_pixel(0, 0)[0], 30);
//! assert_eq!(sink.frames()[10].get_pixel(0, 0)[0], 5);
//! # Ok::<(), seamfind::SeamError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::config::Verbosity;
use crate::downscale::{DEFAULT_TARGET_HEIGHT, downscale_frame};
use crate::error::{SeamError, WindowSide};
use crate::extract::read_window;
use crate::frame::{ChannelMode, Frame};
use crate::metric::ssim_map;
use crate::progress::{
    CancellationToken, NoOpProgress, OperationType, ProgressCallback, ProgressTracker,
};
use crate::sink::VideoSink;
use crate::source::{SourceOpener, VideoSource};

/// A chosen cut point between two clips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seam {
    /// The clip that plays first.
    pub lead_path: PathBuf,
    /// Last frame of the leading clip to keep.
    pub lead_frame: u64,
    /// The clip that plays second.
    pub follow_path: PathBuf,
    /// First frame of the following clip to keep.
    pub follow_frame: u64,
}

impl Seam {
    /// Describe a seam.
    pub fn new<L: Into<PathBuf>, F: Into<PathBuf>>(
        lead_path: L,
        lead_frame: u64,
        follow_path: F,
        follow_frame: u64,
    ) -> Self {
        Self {
            lead_path: lead_path.into(),
            lead_frame,
            follow_path: follow_path.into(),
            follow_frame,
        }
    }

    /// Directory under `root` for this seam's output: the following clip's
    /// file stem followed by both frame numbers, e.g. `part2 1499 12`.
    pub fn output_directory(&self, root: &Path) -> PathBuf {
        root.join(format!(
            "{} {} {}",
            self.follow_stem(),
            self.lead_frame,
            self.follow_frame
        ))
    }

    /// File name for the stitched video, `<follow stem>.mp4`.
    pub fn video_file_name(&self) -> String {
        format!("{}.mp4", self.follow_stem())
    }

    fn follow_stem(&self) -> String {
        self.follow_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stitched".to_string())
    }
}

/// Settings for [`Stitcher`].
#[derive(Clone)]
pub struct StitchOptions {
    pub(crate) lead_seconds: u64,
    pub(crate) follow_seconds: u64,
    pub(crate) diagnostic_height: Option<u32>,
    pub(crate) verbosity: Verbosity,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for StitchOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StitchOptions")
            .field("lead_seconds", &self.lead_seconds)
            .field("follow_seconds", &self.follow_seconds)
            .field("diagnostic_height", &self.diagnostic_height)
            .field("verbosity", &self.verbosity.level())
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl StitchOptions {
    /// Five seconds from each clip, diagnostics resized to 480 rows.
    pub fn new() -> Self {
        Self {
            lead_seconds: 5,
            follow_seconds: 5,
            diagnostic_height: Some(DEFAULT_TARGET_HEIGHT),
            verbosity: Verbosity::default(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Seconds of the leading clip to keep, ending at the seam.
    #[must_use]
    pub fn with_lead_seconds(mut self, seconds: u64) -> Self {
        self.lead_seconds = seconds;
        self
    }

    /// Seconds of the following clip to keep, starting at the seam.
    #[must_use]
    pub fn with_follow_seconds(mut self, seconds: u64) -> Self {
        self.follow_seconds = seconds;
        self
    }

    /// Height of the diagnostic images, or `None` for full resolution.
    #[must_use]
    pub fn with_diagnostic_height(mut self, height: Option<u32>) -> Self {
        self.diagnostic_height = height;
        self
    }

    /// Diagnostic verbosity (clamped to 0–3).
    #[must_use]
    pub fn with_verbosity(mut self, level: u8) -> Self {
        self.verbosity = Verbosity::new(level);
        self
    }

    /// Attach a progress callback, fired once per frame written.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn validate(&self) -> Result<(), SeamError> {
        if self.lead_seconds == 0 || self.follow_seconds == 0 {
            return Err(SeamError::InvalidOptions(
                "stitch lengths must be greater than zero".to_string(),
            ));
        }
        if self.diagnostic_height == Some(0) {
            return Err(SeamError::InvalidOptions(
                "diagnostic height must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Frames read around a seam, ready to be written.
#[derive(Debug, Clone)]
pub struct StitchedClip {
    /// Frame rate of the leading clip, used for the output.
    pub frames_per_second: f64,
    /// Frames up to and including the leading seam frame.
    pub lead: Vec<RgbImage>,
    /// Frames from the following seam frame on.
    pub follow: Vec<RgbImage>,
}

impl StitchedClip {
    /// Total number of frames.
    pub fn len(&self) -> usize {
        self.lead.len() + self.follow.len()
    }

    /// Returns `true` if there are no frames at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The last leading frame and the first following frame.
    pub fn boundary(&self) -> Option<(&RgbImage, &RgbImage)> {
        Some((self.lead.last()?, self.follow.first()?))
    }
}

/// Paths of the diagnostic images written for a seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticImages {
    /// The last leading frame.
    pub first: PathBuf,
    /// The first following frame.
    pub second: PathBuf,
    /// Inverted absolute difference.
    pub absolute_difference: PathBuf,
    /// Squared SSIM map.
    pub ssim_difference: PathBuf,
}

/// Reads frames around a seam and writes them out.
pub struct Stitcher {
    opener: Arc<dyn SourceOpener>,
    options: StitchOptions,
}

impl Debug for Stitcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Stitcher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Stitcher {
    /// Create a stitcher that opens files with FFmpeg.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::InvalidOptions`] if either length is zero.
    #[cfg(feature = "ffmpeg")]
    pub fn new(options: StitchOptions) -> Result<Self, SeamError> {
        Self::with_opener(Arc::new(crate::media::MediaOpener::new()?), options)
    }

    /// Create a stitcher that opens sources through `opener`.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::InvalidOptions`] if either length is zero.
    pub fn with_opener(
        opener: Arc<dyn SourceOpener>,
        options: StitchOptions,
    ) -> Result<Self, SeamError> {
        options.validate()?;
        Ok(Self { opener, options })
    }

    /// Read the frames on both sides of `seam`.
    ///
    /// Uses the leading clip's frame rate for both lengths, as the output
    /// plays at that rate.
    ///
    /// # Errors
    ///
    /// * [`SeamError::SourceOpen`] if either clip cannot be opened.
    /// * [`SeamError::EmptyWindow`] if no frames can be read on a side.
    /// * [`SeamError::Cancelled`] if the cancellation token fires.
    pub fn collect(&self, seam: &Seam) -> Result<StitchedClip, SeamError> {
        let (frames_per_second, lead) = {
            let mut source = self.opener.open(&seam.lead_path)?;
            let frames_per_second = source.frames_per_second();
            let count = whole_frames(frames_per_second, self.options.lead_seconds);
            let end = seam.lead_frame.saturating_add(1);
            let start = end.saturating_sub(count);
            if self.options.verbosity.stages() {
                log::info!(
                    "Getting {count} frames from {}",
                    seam.lead_path.display()
                );
            }
            let frames = self.read_rgb(&mut *source, start, end - start)?;
            (frames_per_second, frames)
        };
        if lead.is_empty() {
            return Err(SeamError::EmptyWindow {
                side: WindowSide::Lead,
            });
        }

        let follow = {
            let mut source = self.opener.open(&seam.follow_path)?;
            let count = whole_frames(frames_per_second, self.options.follow_seconds);
            if self.options.verbosity.stages() {
                log::info!(
                    "Getting {count} frames from {}",
                    seam.follow_path.display()
                );
            }
            self.read_rgb(&mut *source, seam.follow_frame, count)?
        };
        if follow.is_empty() {
            return Err(SeamError::EmptyWindow {
                side: WindowSide::Follow,
            });
        }

        Ok(StitchedClip {
            frames_per_second,
            lead,
            follow,
        })
    }

    /// Append every frame of `clip` to `sink`, then finish it.
    ///
    /// # Errors
    ///
    /// Propagates sink errors, and returns [`SeamError::Cancelled`] if the
    /// cancellation token fires between frames.
    pub fn write(&self, clip: &StitchedClip, sink: &mut dyn VideoSink) -> Result<(), SeamError> {
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::Stitching,
            Some(clip.len() as u64),
            1,
        );
        for frame in clip.lead.iter().chain(&clip.follow) {
            if self
                .options
                .cancellation
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                return Err(SeamError::Cancelled);
            }
            sink.append(frame)?;
            tracker.advance(None);
        }
        sink.finish()
    }

    /// Write the four diagnostic images for `clip` into `directory`, which
    /// is created if missing.
    ///
    /// # Errors
    ///
    /// * [`SeamError::EmptyWindow`] if either side of `clip` is empty.
    /// * [`SeamError::IoError`] / [`SeamError::ImageError`] if a file cannot
    ///   be written.
    pub fn write_diagnostics(
        &self,
        clip: &StitchedClip,
        directory: &Path,
    ) -> Result<DiagnosticImages, SeamError> {
        let (last_lead, first_follow) = clip.boundary().ok_or(SeamError::EmptyWindow {
            side: if clip.lead.is_empty() {
                WindowSide::Lead
            } else {
                WindowSide::Follow
            },
        })?;

        let resize = |image: &RgbImage| -> Frame {
            let frame = Frame::from_rgb(image.clone(), ChannelMode::Color);
            match self.options.diagnostic_height {
                Some(height) => downscale_frame(&frame, height),
                None => frame,
            }
        };
        let first = resize(last_lead);
        let second = resize(first_follow);

        fs::create_dir_all(directory)?;
        let images = DiagnosticImages {
            first: directory.join("first.jpg"),
            second: directory.join("second.jpg"),
            absolute_difference: directory.join("diff_abs.jpg"),
            ssim_difference: directory.join("diff_ssim.jpg"),
        };

        let first_rgb = first.to_rgb_image();
        let second_rgb = second.to_rgb_image();
        first_rgb.save(&images.first)?;
        second_rgb.save(&images.second)?;
        absolute_difference_image(&first_rgb, &second_rgb)?.save(&images.absolute_difference)?;
        ssim_difference_image(&first, &second)?.save(&images.ssim_difference)?;

        log::debug!("Wrote diagnostics to {}", directory.display());
        Ok(images)
    }

    fn read_rgb(
        &self,
        source: &mut dyn VideoSource,
        start: u64,
        count: u64,
    ) -> Result<Vec<RgbImage>, SeamError> {
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::FrameExtraction,
            Some(count),
            1,
        );
        let frames = read_window(
            source,
            start,
            count,
            ChannelMode::Color,
            self.options.verbosity,
            self.options.cancellation.as_ref(),
            Some(&mut tracker),
        )?;
        Ok(frames
            .into_iter()
            .map(|frame| match frame {
                Frame::Rgb(image) => image,
                other => other.to_rgb_image(),
            })
            .collect())
    }
}

/// Frame count for `seconds` at the whole part of `frames_per_second`.
fn whole_frames(frames_per_second: f64, seconds: u64) -> u64 {
    (frames_per_second.trunc().max(0.0) as u64).saturating_mul(seconds)
}

/// Per-sample `255 - |a - b|`: identical regions are white.
///
/// # Errors
///
/// Returns [`SeamError::FrameMismatch`] if the images differ in size.
pub fn absolute_difference_image(a: &RgbImage, b: &RgbImage) -> Result<RgbImage, SeamError> {
    if a.dimensions() != b.dimensions() {
        return Err(SeamError::FrameMismatch {
            expected_width: a.width(),
            expected_height: a.height(),
            expected_channels: 3,
            found_width: b.width(),
            found_height: b.height(),
            found_channels: 3,
        });
    }
    Ok(RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let Rgb(left) = *a.get_pixel(x, y);
        let Rgb(right) = *b.get_pixel(x, y);
        Rgb(std::array::from_fn(|channel| {
            255 - left[channel].abs_diff(right[channel])
        }))
    }))
}

/// The SSIM map of `a` against `b`, squared and scaled to 0–255.
///
/// Squaring pushes everything but near-identical structure towards black,
/// which makes a bad seam easy to spot.
///
/// # Errors
///
/// Returns [`SeamError::FrameMismatch`] if the frames differ in geometry.
pub fn ssim_difference_image(a: &Frame, b: &Frame) -> Result<GrayImage, SeamError> {
    let map = ssim_map(a, b)?;
    let width = a.width();
    Ok(GrayImage::from_fn(width, a.height(), |x, y| {
        let value = map[(y * width + x) as usize];
        Luma([((value * value).clamp(0.0, 1.0) * 255.0) as u8])
    }))
}
