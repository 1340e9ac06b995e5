//! Matching orchestration.
//!
//! [`FrameMatcher`] ties the pieces together: it reads the tail of the
//! leading clip once, then for each following clip reads its head, applies
//! the same channel mode and downscaling, and searches for the most similar
//! pair.
//!
//! A leading clip that cannot be opened or yields no frames fails the whole
//! call. Following clips fail independently: each one produces a
//! [`FollowOutcome`], and a missing or empty clip is reported as
//! [`FollowOutcome::Absent`] without disturbing the others.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use image::{Rgb, RgbImage};
//! use seamfind::{FrameMatcher, MatchOptions, MemoryClip, MemoryOpener};
//!
//! let solid = |rgb| RgbImage::from_pixel(8, 8, Rgb(rgb));
//! let lead = MemoryClip::from_fn(100, 10.0, |i| if i == 99 { solid([255, 0, 0]) } else { solid([0, 0, 255]) });
//! let follow = MemoryClip::from_fn(50, 10.0, |i| if i == 3 { solid([255, 0, 0]) } else { solid([0, 255, 0]) });
//!
//! let opener = MemoryOpener::new()
//!     .with_clip("lead.mp4", lead)
//!     .with_clip("follow.mp4", follow);
//! let matcher = FrameMatcher::with_opener(Arc::new(opener), MatchOptions::new().with_downscale(false))?;
//!
//! let outcomes = matcher.run("lead.mp4", &["follow.mp4"])?;
//! let best = outcomes[0].match_result().unwrap();
//! assert_eq!((best.lead_index, best.follow_index), (99, 3));
//! # Ok::<(), seamfind::SeamError>(())
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use crate::config::MatchOptions;
use crate::downscale::downscale_frames;
use crate::error::{SeamError, WindowSide};
use crate::extract::read_window;
use crate::frame::{Frame, FrameWindow};
use crate::pool::WorkerPool;
use crate::progress::{OperationType, ProgressTracker};
use crate::search::{MatchResult, search_window};
use crate::source::{SourceOpener, VideoSource};

/// Why a following clip produced no match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsentReason {
    /// The clip could not be opened; carries the opener's message.
    OpenFailed(String),
    /// The clip opened but no frames could be read from its start.
    EmptyWindow,
    /// The clip's frames, after preprocessing, differ in size or channel
    /// count from the leading window. Sizes are `(width, height, channels)`.
    GeometryMismatch {
        /// Geometry of the leading window.
        expected: (u32, u32, u8),
        /// Geometry of the first differing frame of this clip.
        found: (u32, u32, u8),
    },
}

impl fmt::Display for AbsentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbsentReason::OpenFailed(reason) => write!(f, "could not open: {reason}"),
            AbsentReason::EmptyWindow => f.write_str("no frames could be read"),
            AbsentReason::GeometryMismatch { expected, found } => write!(
                f,
                "frame size {}x{}x{} does not match the leading clip's {}x{}x{}",
                found.0, found.1, found.2, expected.0, expected.1, expected.2
            ),
        }
    }
}

/// The result of matching one following clip.
#[derive(Debug, Clone, PartialEq)]
pub enum FollowOutcome {
    /// The best pair found between the leading clip and this clip.
    Matched(MatchResult),
    /// No search was possible for this clip.
    Absent {
        /// The following clip's path.
        path: PathBuf,
        /// What went wrong.
        reason: AbsentReason,
    },
}

impl FollowOutcome {
    /// The match, if one was found.
    pub fn match_result(&self) -> Option<&MatchResult> {
        match self {
            FollowOutcome::Matched(result) => Some(result),
            FollowOutcome::Absent { .. } => None,
        }
    }

    /// Returns `true` for [`FollowOutcome::Matched`].
    pub fn is_matched(&self) -> bool {
        matches!(self, FollowOutcome::Matched(_))
    }
}

/// Finds the best seam between a leading clip and any number of following
/// clips.
///
/// The worker pool is created once in the constructor and reused by every
/// [`run`](FrameMatcher::run); it shuts down when the matcher is dropped.
pub struct FrameMatcher {
    opener: Arc<dyn SourceOpener>,
    options: MatchOptions,
    pool: WorkerPool,
}

impl fmt::Debug for FrameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameMatcher")
            .field("options", &self.options)
            .field("pool", &self.pool)
            .finish()
    }
}

impl FrameMatcher {
    /// Create a matcher that opens files with FFmpeg.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::InvalidOptions`] if `options` fail validation, or
    /// [`SeamError::WorkerPool`] if the worker threads cannot be started.
    #[cfg(feature = "ffmpeg")]
    pub fn new(options: MatchOptions) -> Result<Self, SeamError> {
        Self::with_opener(Arc::new(crate::media::MediaOpener::new()?), options)
    }

    /// Create a matcher that opens sources through `opener`.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::InvalidOptions`] if `options` fail validation, or
    /// [`SeamError::WorkerPool`] if the worker threads cannot be started.
    pub fn with_opener(
        opener: Arc<dyn SourceOpener>,
        options: MatchOptions,
    ) -> Result<Self, SeamError> {
        options.validate()?;
        let pool = WorkerPool::new(options.worker_count())?;
        if options.verbosity.timing() {
            log::debug!("Started worker pool with {} threads", pool.worker_count());
        }
        Ok(Self {
            opener,
            options,
            pool,
        })
    }

    /// The options this matcher was built with.
    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Number of worker threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Match the end of `lead_path` against the start of each of
    /// `follow_paths`.
    ///
    /// Returns one outcome per following path, in input order.
    ///
    /// # Errors
    ///
    /// * [`SeamError::SourceOpen`] if the leading clip cannot be opened.
    /// * [`SeamError::EmptyWindow`] if no frames can be read from the end of
    ///   the leading clip.
    /// * [`SeamError::FrameMismatch`] if the leading window's own frames
    ///   differ in size. A following clip with another size is recorded as
    ///   [`AbsentReason::GeometryMismatch`] instead.
    /// * [`SeamError::Cancelled`] if the cancellation token fires.
    pub fn run<L, F>(&self, lead_path: L, follow_paths: &[F]) -> Result<Vec<FollowOutcome>, SeamError>
    where
        L: AsRef<Path>,
        F: AsRef<Path>,
    {
        let started = Instant::now();
        let lead_path = lead_path.as_ref();
        let verbosity = self.options.verbosity;

        let (frames, start) = {
            let mut source = self.opener.open(lead_path)?;
            let frames_to_read = self.frames_to_read(&*source);
            let start = self
                .options
                .lead_anchor
                .start_frame(source.frame_count(), frames_to_read);
            if verbosity.stages() {
                log::info!(
                    "Reading {frames_to_read} frames from {} starting at frame {start}",
                    lead_path.display()
                );
            }
            (self.read(&mut *source, start, frames_to_read)?, start)
        };
        let lead = FrameWindow::new(self.preprocess(frames)?, start);
        if lead.is_empty() {
            return Err(SeamError::EmptyWindow {
                side: WindowSide::Lead,
            });
        }

        let mut outcomes = Vec::with_capacity(follow_paths.len());
        for follow_path in follow_paths {
            let follow_path = follow_path.as_ref();
            outcomes.push(self.match_follower(&lead, follow_path)?);
        }

        if verbosity.timing() {
            log::debug!(
                "Matched {} following clip(s) in {:.2?}",
                follow_paths.len(),
                started.elapsed()
            );
        }
        Ok(outcomes)
    }

    fn match_follower(&self, lead: &FrameWindow, path: &Path) -> Result<FollowOutcome, SeamError> {
        let verbosity = self.options.verbosity;

        let frames = {
            let mut source = match self.opener.open(path) {
                Ok(source) => source,
                Err(error) => {
                    log::warn!("Skipping {}: {error}", path.display());
                    let reason = match error {
                        SeamError::SourceOpen { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    return Ok(FollowOutcome::Absent {
                        path: path.to_path_buf(),
                        reason: AbsentReason::OpenFailed(reason),
                    });
                }
            };
            let frames_to_read = self.frames_to_read(&*source);
            if verbosity.stages() {
                log::info!("Reading {frames_to_read} frames from {}", path.display());
            }
            self.read(&mut *source, 0, frames_to_read)?
        };
        let follow = FrameWindow::new(self.preprocess(frames)?, 0);

        if follow.is_empty() {
            log::warn!("Skipping {}: no frames could be read", path.display());
            return Ok(FollowOutcome::Absent {
                path: path.to_path_buf(),
                reason: AbsentReason::EmptyWindow,
            });
        }

        let mismatch = lead.frames.first().and_then(|reference| {
            follow
                .frames
                .iter()
                .find(|frame| !reference.same_geometry(frame))
                .map(|frame| AbsentReason::GeometryMismatch {
                    expected: (reference.width(), reference.height(), reference.channels()),
                    found: (frame.width(), frame.height(), frame.channels()),
                })
        });
        if let Some(reason) = mismatch {
            log::warn!("Skipping {}: {reason}", path.display());
            return Ok(FollowOutcome::Absent {
                path: path.to_path_buf(),
                reason,
            });
        }

        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::Search,
            Some(lead.len() as u64),
            self.options.batch_size,
        );
        let result = search_window(
            lead,
            &follow,
            self.options.metric,
            &self.pool,
            verbosity,
            self.options.cancellation.as_ref(),
            Some(&mut tracker),
        )?;
        if verbosity.stages() {
            log::info!(
                "{}: lead frame {}, follow frame {}, {} {}",
                path.display(),
                result.lead_index,
                result.follow_index,
                self.options.metric,
                result.score
            );
        }
        Ok(FollowOutcome::Matched(result))
    }

    /// Whole frames per second times the window length in seconds.
    fn frames_to_read(&self, source: &dyn VideoSource) -> u64 {
        let whole_fps = source.frames_per_second().trunc().max(0.0) as u64;
        whole_fps.saturating_mul(self.options.seconds)
    }

    fn read(
        &self,
        source: &mut dyn VideoSource,
        start: u64,
        count: u64,
    ) -> Result<Vec<Frame>, SeamError> {
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::FrameExtraction,
            Some(count),
            self.options.batch_size,
        );
        read_window(
            source,
            start,
            count,
            self.options.channel_mode,
            self.options.verbosity,
            self.options.cancellation.as_ref(),
            Some(&mut tracker),
        )
    }

    /// Apply the downscale policy. Both windows go through here.
    fn preprocess(&self, frames: Vec<Frame>) -> Result<Vec<Frame>, SeamError> {
        if !self.options.downscale || frames.is_empty() {
            return Ok(frames);
        }
        if self.options.is_cancelled() {
            return Err(SeamError::Cancelled);
        }
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::Downscaling,
            Some(frames.len() as u64),
            self.options.batch_size,
        );
        let scaled = downscale_frames(&frames, self.options.target_height, &self.pool);
        tracker.advance_by(scaled.len() as u64);
        Ok(scaled)
    }
}

/// Match `lead` against each of `follows` using FFmpeg to decode.
///
/// Shorthand for [`FrameMatcher::new`] followed by [`FrameMatcher::run`].
///
/// ```no_run
/// use seamfind::{MatchOptions, Metric, find_matching_frames};
///
/// let options = MatchOptions::new().with_metric(Metric::Ssim).with_seconds(2);
/// for outcome in find_matching_frames("part1.mp4", &["part2.mp4", "part3.mp4"], options)? {
///     println!("{outcome:?}");
/// }
/// # Ok::<(), seamfind::SeamError>(())
/// ```
#[cfg(feature = "ffmpeg")]
pub fn find_matching_frames<L, F>(
    lead: L,
    follows: &[F],
    options: MatchOptions,
) -> Result<Vec<FollowOutcome>, SeamError>
where
    L: AsRef<Path>,
    F: AsRef<Path>,
{
    FrameMatcher::new(options)?.run(lead, follows)
}
