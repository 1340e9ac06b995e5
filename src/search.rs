//! Best-match search between two frame windows.
//!
//! Every leading frame is scored against every following frame. Rows (one
//! leading frame each) are processed in order; the cells of a row are
//! scored in parallel on the [`WorkerPool`] and reduced once the whole row
//! has been collected, so the result never depends on thread scheduling.
//!
//! # Example
//!
//! ```
//! use image::{GrayImage, Luma};
//! use seamfind::{Frame, FrameWindow, Metric, Verbosity, WorkerPool, search};
//!
//! let flat = |value| Frame::Gray(GrayImage::from_pixel(8, 8, Luma([value])));
//! let lead = FrameWindow::new(vec![flat(10), flat(50), flat(90)], 100);
//! let follow = FrameWindow::new(vec![flat(0), flat(49), flat(200)], 0);
//!
//! let pool = WorkerPool::new(2)?;
//! let best = search(&lead, &follow, Metric::Mse, &pool, Verbosity::default(), None, None)?;
//! assert_eq!((best.lead_index, best.follow_index, best.score), (101, 1, 1.0));
//! # Ok::<(), seamfind::SeamError>(())
//! ```

use std::sync::Arc;
use std::time::Instant;

use crate::config::Verbosity;
use crate::error::{SeamError, WindowSide};
use crate::frame::FrameWindow;
use crate::metric::Metric;
use crate::pool::WorkerPool;
use crate::progress::{CancellationToken, OperationType, ProgressCallback, ProgressTracker};

/// The most similar frame pair found by a search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Absolute index of the frame in the leading video.
    pub lead_index: u64,
    /// Absolute index of the frame in the following video.
    pub follow_index: u64,
    /// The metric value for this pair.
    pub score: f64,
}

/// Find the pair of frames from `lead` and `follow` that scores best under
/// `metric`.
///
/// Ties resolve to the earliest leading frame, then the earliest following
/// frame. Indices in the result are absolute: each window's offset is added
/// to the position of the chosen frame.
///
/// # Errors
///
/// * [`SeamError::EmptyWindow`] if either window has no frames.
/// * [`SeamError::FrameMismatch`] if any frame differs in size or channel
///   count from the first leading frame.
/// * [`SeamError::Cancelled`] if `cancellation` fires between rows.
pub fn search(
    lead: &FrameWindow,
    follow: &FrameWindow,
    metric: Metric,
    pool: &WorkerPool,
    verbosity: Verbosity,
    progress: Option<Arc<dyn ProgressCallback>>,
    cancellation: Option<&CancellationToken>,
) -> Result<MatchResult, SeamError> {
    let mut tracker = progress.map(|callback| {
        ProgressTracker::new(
            callback,
            OperationType::Search,
            Some(lead.len() as u64),
            1,
        )
    });
    search_window(
        lead,
        follow,
        metric,
        pool,
        verbosity,
        cancellation,
        tracker.as_mut(),
    )
}

/// [`search`] with a progress tracker advanced once per row.
pub(crate) fn search_window(
    lead: &FrameWindow,
    follow: &FrameWindow,
    metric: Metric,
    pool: &WorkerPool,
    verbosity: Verbosity,
    cancellation: Option<&CancellationToken>,
    mut tracker: Option<&mut ProgressTracker>,
) -> Result<MatchResult, SeamError> {
    let reference = lead.frames.first().ok_or(SeamError::EmptyWindow {
        side: WindowSide::Lead,
    })?;
    if follow.is_empty() {
        return Err(SeamError::EmptyWindow {
            side: WindowSide::Follow,
        });
    }
    for frame in lead.frames.iter().chain(&follow.frames) {
        reference.ensure_same_geometry(frame)?;
    }

    if verbosity.timing() {
        log::debug!(
            "Searching {}x{} pairs with {metric} on {} workers",
            lead.len(),
            follow.len(),
            pool.worker_count()
        );
    }

    let started = Instant::now();
    let mut best = MatchResult {
        lead_index: lead.offset,
        follow_index: follow.offset,
        score: metric.initial_best(),
    };
    let mut found = false;

    for (row, lead_frame) in lead.frames.iter().enumerate() {
        if cancellation.is_some_and(CancellationToken::is_cancelled) {
            return Err(SeamError::Cancelled);
        }

        let scores = pool
            .map(&follow.frames, |follow_frame| {
                metric.score(lead_frame, follow_frame)
            })
            .into_iter()
            .collect::<Result<Vec<f64>, SeamError>>()?;
        let (column, score) = best_in_row(metric, &scores);

        if verbosity.details() {
            log::trace!(
                "Row {}: best {metric} {score} at following frame {}",
                lead.absolute_index(row),
                follow.absolute_index(column)
            );
        }

        if !found || metric.is_better(score, best.score) {
            best = MatchResult {
                lead_index: lead.absolute_index(row),
                follow_index: follow.absolute_index(column),
                score,
            };
            found = true;
        }

        if let Some(tracker) = tracker.as_deref_mut() {
            tracker.advance(Some(lead.absolute_index(row)));
        }
    }
    if let Some(tracker) = tracker {
        tracker.flush();
    }

    if verbosity.timing() {
        log::debug!("Search finished in {:.2?}", started.elapsed());
    }
    Ok(best)
}

/// Position and value of the best score in a row. Scanning in order with a
/// strict comparison keeps the lowest position on ties.
fn best_in_row(metric: Metric, scores: &[f64]) -> (usize, f64) {
    let mut best = (0, metric.initial_best());
    for (column, &score) in scores.iter().enumerate() {
        if column == 0 || metric.is_better(score, best.1) {
            best = (column, score);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_ties_keep_the_first_column() {
        assert_eq!(best_in_row(Metric::Mse, &[3.0, 1.0, 1.0, 2.0]), (1, 1.0));
        assert_eq!(
            best_in_row(Metric::Psnr, &[f64::INFINITY, 20.0, f64::INFINITY]),
            (0, f64::INFINITY)
        );
    }
}
