//! Matching configuration.
//!
//! [`MatchOptions`] is a builder that carries every knob of a matching run
//! (window length, channel mode, downscaling, metric, verbosity, worker
//! count) plus progress callbacks and cancellation tokens, without
//! polluting every function signature.
//!
//! # Example
//!
//! ```
//! use seamfind::{CancellationToken, ChannelMode, MatchOptions, Metric};
//!
//! let token = CancellationToken::new();
//! let options = MatchOptions::new()
//!     .with_seconds(3)
//!     .with_channel_mode(ChannelMode::Color)
//!     .with_metric(Metric::Ssim)
//!     .with_downscale(true)
//!     .with_verbosity(2)
//!     .with_cancellation(token.clone());
//! assert!(options.validate().is_ok());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::downscale::DEFAULT_TARGET_HEIGHT;
use crate::error::SeamError;
use crate::frame::ChannelMode;
use crate::metric::Metric;
use crate::pool::default_worker_count;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Diagnostic verbosity, 0 (silent) to 3 (per-row detail).
///
/// Verbosity never changes results, only which `log` records are emitted:
///
/// * `>= 1` — stage of operation (windows being read, short reads);
/// * `>= 2` — worker counts and timing;
/// * `>= 3` — one record per search row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Verbosity(u8);

impl Verbosity {
    /// Highest supported level.
    pub const MAX: u8 = 3;

    /// Create a verbosity level, clamped to [`Verbosity::MAX`].
    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    /// The numeric level.
    pub fn level(self) -> u8 {
        self.0
    }

    /// Report stages of operation.
    pub fn stages(self) -> bool {
        self.0 >= 1
    }

    /// Report worker counts and timing.
    pub fn timing(self) -> bool {
        self.0 >= 2
    }

    /// Report every search row.
    pub fn details(self) -> bool {
        self.0 >= 3
    }
}

/// Where the leading window starts relative to the end of the leading clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeadWindowAnchor {
    /// Start at `total - frames_to_read`, so the window ends on the last
    /// frame of the clip. This is the default.
    #[default]
    Tail,
    /// Start at `total - frames_to_read - 1`, one frame earlier. The window
    /// then ends on the second-to-last frame; kept for parity with older
    /// releases.
    Legacy,
}

impl LeadWindowAnchor {
    /// First frame of the leading window for a clip of `total_frames` when
    /// reading `frames_to_read` frames. Saturates at 0 for short clips.
    pub fn start_frame(self, total_frames: u64, frames_to_read: u64) -> u64 {
        let start = total_frames.saturating_sub(frames_to_read);
        match self {
            LeadWindowAnchor::Tail => start,
            LeadWindowAnchor::Legacy => start.saturating_sub(1),
        }
    }
}

/// Configuration for a matching run.
///
/// All fields have defaults matching the command-line tool: a two second
/// window, grayscale comparison, downscaling to 480 rows, MSE, silent.
#[derive(Clone)]
pub struct MatchOptions {
    /// Seconds of video to search at the end/start of each clip.
    pub(crate) seconds: u64,
    pub(crate) channel_mode: ChannelMode,
    pub(crate) downscale: bool,
    pub(crate) target_height: u32,
    pub(crate) metric: Metric,
    pub(crate) verbosity: Verbosity,
    /// Explicit worker count. `None` means one per logical processor.
    pub(crate) threads: Option<usize>,
    pub(crate) lead_anchor: LeadWindowAnchor,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N items).
    pub(crate) batch_size: u64,
}

impl Debug for MatchOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MatchOptions")
            .field("seconds", &self.seconds)
            .field("channel_mode", &self.channel_mode)
            .field("downscale", &self.downscale)
            .field("target_height", &self.target_height)
            .field("metric", &self.metric)
            .field("verbosity", &self.verbosity.level())
            .field("threads", &self.threads)
            .field("lead_anchor", &self.lead_anchor)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            seconds: 2,
            channel_mode: ChannelMode::Grayscale,
            downscale: true,
            target_height: DEFAULT_TARGET_HEIGHT,
            metric: Metric::Mse,
            verbosity: Verbosity::default(),
            threads: None,
            lead_anchor: LeadWindowAnchor::Tail,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set how many seconds to search at the seam of each clip.
    #[must_use]
    pub fn with_seconds(mut self, seconds: u64) -> Self {
        self.seconds = seconds;
        self
    }

    /// Compare in colour or grayscale.
    #[must_use]
    pub fn with_channel_mode(mut self, mode: ChannelMode) -> Self {
        self.channel_mode = mode;
        self
    }

    /// Enable or disable downscaling both windows before searching.
    #[must_use]
    pub fn with_downscale(mut self, downscale: bool) -> Self {
        self.downscale = downscale;
        self
    }

    /// Set the frame height used when downscaling. Defaults to 480.
    #[must_use]
    pub fn with_target_height(mut self, height: u32) -> Self {
        self.target_height = height;
        self
    }

    /// Select the similarity metric.
    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the diagnostic verbosity (clamped to 0–3).
    #[must_use]
    pub fn with_verbosity(mut self, level: u8) -> Self {
        self.verbosity = Verbosity::new(level);
        self
    }

    /// Use exactly `threads` workers instead of one per logical processor.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Choose how the leading window is anchored to the end of the clip.
    #[must_use]
    pub fn with_lead_anchor(mut self, anchor: LeadWindowAnchor) -> Self {
        self.lead_anchor = anchor;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, extraction and search stop at their next
    /// checkpoint and return [`SeamError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Seconds searched per clip.
    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    /// Channel mode used for comparison.
    pub fn channel_mode(&self) -> ChannelMode {
        self.channel_mode
    }

    /// Whether windows are downscaled.
    pub fn downscale(&self) -> bool {
        self.downscale
    }

    /// Height frames are downscaled to.
    pub fn target_height(&self) -> u32 {
        self.target_height
    }

    /// The selected metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Diagnostic verbosity.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Leading window anchor.
    pub fn lead_anchor(&self) -> LeadWindowAnchor {
        self.lead_anchor
    }

    /// The number of workers a matcher built from these options will use.
    pub fn worker_count(&self) -> usize {
        self.threads.unwrap_or_else(default_worker_count)
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::InvalidOptions`] for a zero window length, a zero
    /// target height, or a zero worker count.
    pub fn validate(&self) -> Result<(), SeamError> {
        if self.seconds == 0 {
            return Err(SeamError::InvalidOptions(
                "seconds must be greater than zero".to_string(),
            ));
        }
        if self.downscale && self.target_height == 0 {
            return Err(SeamError::InvalidOptions(
                "target height must be greater than zero".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(SeamError::InvalidOptions(
                "worker count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
