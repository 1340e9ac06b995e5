//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring long-running
//! matching work, [`CancellationToken`] for cooperative cancellation, and
//! [`ProgressInfo`] for progress snapshots.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use seamfind::{MatchOptions, OperationType, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if info.operation == OperationType::Search {
//!             if let Some(pct) = info.percentage {
//!                 println!("search {pct:.1}% complete");
//!             }
//!         }
//!     }
//! }
//!
//! let options = MatchOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Reading a frame window from a video source.
    FrameExtraction,
    /// Resizing a frame window.
    Downscaling,
    /// Scoring leading frames against a following window.
    Search,
    /// Writing a stitched clip.
    Stitching,
}

/// A snapshot of progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many items (frames or search rows) have been processed so far.
    pub current: u64,
    /// Total items expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// The absolute frame number currently being processed, if any.
    pub current_frame: Option<u64>,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`] because the matcher may be
/// driven from any thread.
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during an operation.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to stop the
/// associated extraction or search at its next checkpoint.
///
/// # Example
///
/// ```
/// use seamfind::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts completed items for one operation and forwards snapshots to a
/// callback every `batch_size` items.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    done: u64,
    batch_size: u64,
    unreported: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            done: 0,
            batch_size: batch_size.max(1),
            unreported: 0,
            started: Instant::now(),
        }
    }

    /// One more item done; reports once a full batch has accumulated.
    pub(crate) fn advance(&mut self, frame_number: Option<u64>) {
        self.done += 1;
        self.unreported += 1;
        if self.unreported >= self.batch_size {
            self.unreported = 0;
            self.callback.on_progress(&self.snapshot(frame_number));
        }
    }

    /// `count` items done at once; always reports.
    pub(crate) fn advance_by(&mut self, count: u64) {
        self.done += count;
        self.unreported = 0;
        self.callback.on_progress(&self.snapshot(None));
    }

    /// Report the tail of a partial batch, if any.
    pub(crate) fn flush(&mut self) {
        if self.unreported > 0 {
            self.unreported = 0;
            self.callback.on_progress(&self.snapshot(None));
        }
    }

    /// Emit a closing report regardless of batching.
    pub(crate) fn finish(&mut self) {
        self.callback.on_progress(&self.snapshot(None));
    }

    fn snapshot(&self, current_frame: Option<u64>) -> ProgressInfo {
        let elapsed = self.started.elapsed();
        let known_total = self.total.filter(|&total| total > 0);

        // Remaining time assumes the average rate so far holds.
        let estimated_remaining = known_total
            .filter(|_| self.done > 0)
            .map(|total| {
                let left = total.saturating_sub(self.done) as f64;
                elapsed.mul_f64(left / self.done as f64)
            });

        ProgressInfo {
            operation: self.operation,
            current: self.done,
            total: self.total,
            percentage: known_total.map(|total| self.done as f32 * 100.0 / total as f32),
            elapsed,
            estimated_remaining,
            current_frame,
        }
    }
}
