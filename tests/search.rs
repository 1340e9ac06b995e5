//! Window search tests.

use std::sync::{Arc, Mutex};

use image::{GrayImage, Luma, Rgb, RgbImage};
use seamfind::{
    CancellationToken, Frame, FrameWindow, MatchResult, Metric, OperationType, ProgressCallback,
    ProgressInfo, SeamError, Verbosity, WindowSide, WorkerPool, search,
};

fn flat(value: u8) -> Frame {
    Frame::Gray(GrayImage::from_pixel(8, 8, Luma([value])))
}

fn window(values: &[u8], offset: u64) -> FrameWindow {
    FrameWindow::new(values.iter().copied().map(flat).collect(), offset)
}

fn run(lead: &FrameWindow, follow: &FrameWindow, metric: Metric) -> Result<MatchResult, SeamError> {
    let pool = WorkerPool::new(4).expect("Failed to build worker pool");
    search(lead, follow, metric, &pool, Verbosity::default(), None, None)
}

#[test]
fn finds_the_closest_pair_with_absolute_indices() {
    let lead = window(&[10, 50, 90], 100);
    let follow = window(&[0, 49, 200], 0);

    let best = run(&lead, &follow, Metric::Mse).expect("Failed to search windows");
    assert_eq!(
        best,
        MatchResult {
            lead_index: 101,
            follow_index: 1,
            score: 1.0
        }
    );
}

#[test]
fn follow_offset_is_added() {
    let lead = window(&[30], 0);
    let follow = window(&[0, 0, 30, 0], 7);
    let best = run(&lead, &follow, Metric::Mse).expect("Failed to search windows");
    assert_eq!((best.lead_index, best.follow_index), (0, 9));
}

#[test]
fn every_metric_agrees_on_an_exact_match() {
    let lead = window(&[40, 80, 120, 160], 10);
    let follow = window(&[0, 255, 120, 60], 0);

    for metric in Metric::ALL {
        let best = run(&lead, &follow, metric).expect("Failed to search windows");
        assert_eq!(
            (best.lead_index, best.follow_index),
            (12, 2),
            "metric {metric}"
        );
    }
}

#[test]
fn psnr_of_an_exact_match_is_infinite() {
    let lead = window(&[5, 6, 7], 0);
    let follow = window(&[7], 0);
    let best = run(&lead, &follow, Metric::Psnr).expect("Failed to search windows");
    assert_eq!(best.score, f64::INFINITY);
    assert_eq!(best.lead_index, 2);
}

#[test]
fn ties_resolve_to_the_earliest_pair() {
    // Every pair is identical.
    let lead = window(&[9, 9, 9], 20);
    let follow = window(&[9, 9, 9, 9], 0);

    for metric in Metric::ALL {
        let best = run(&lead, &follow, metric).expect("Failed to search windows");
        assert_eq!((best.lead_index, best.follow_index), (20, 0), "metric {metric}");
    }
}

#[test]
fn later_rows_only_win_by_strict_improvement() {
    let lead = window(&[10, 12, 10], 0);
    let follow = window(&[11], 0);

    // Rows 0, 1 and 2 all score 1.0.
    let best = run(&lead, &follow, Metric::Mse).expect("Failed to search windows");
    assert_eq!((best.lead_index, best.follow_index, best.score), (0, 0, 1.0));
}

#[test]
fn equal_best_rows_keep_the_first() {
    let lead = window(&[11, 50, 60, 70, 80, 11], 0);
    let follow = window(&[11], 0);
    for metric in Metric::ALL {
        let best = run(&lead, &follow, metric).expect("Failed to search windows");
        assert_eq!(best.lead_index, 0, "metric {metric}");
    }
}

#[test]
fn result_does_not_depend_on_worker_count() {
    let lead = FrameWindow::new(
        (0..12u8)
            .map(|index| {
                Frame::Gray(GrayImage::from_fn(16, 16, |x, y| {
                    Luma([((u32::from(index) * 17 + x * 3 + y) % 256) as u8])
                }))
            })
            .collect(),
        300,
    );
    let follow = FrameWindow::new(
        (0..9u8)
            .map(|index| {
                Frame::Gray(GrayImage::from_fn(16, 16, |x, y| {
                    Luma([((u32::from(index) * 29 + x * 3 + y) % 256) as u8])
                }))
            })
            .collect(),
        0,
    );

    for metric in Metric::ALL {
        let results: Vec<MatchResult> = [1, 2, 8]
            .into_iter()
            .map(|threads| {
                let pool = WorkerPool::new(threads).expect("Failed to build worker pool");
                search(&lead, &follow, metric, &pool, Verbosity::default(), None, None).expect("Failed to search windows")
            })
            .collect();
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]), "metric {metric}");
    }
}

#[test]
fn empty_lead_window_is_an_error() {
    let lead = window(&[], 0);
    let follow = window(&[1], 0);
    assert!(matches!(
        run(&lead, &follow, Metric::Mse),
        Err(SeamError::EmptyWindow {
            side: WindowSide::Lead
        })
    ));
}

#[test]
fn empty_follow_window_is_an_error() {
    let lead = window(&[1], 0);
    let follow = window(&[], 0);
    assert!(matches!(
        run(&lead, &follow, Metric::Ssim),
        Err(SeamError::EmptyWindow {
            side: WindowSide::Follow
        })
    ));
}

#[test]
fn mixed_geometry_is_rejected() {
    let lead = window(&[1, 2], 0);
    let follow = FrameWindow::new(
        vec![
            flat(1),
            Frame::Rgb(RgbImage::from_pixel(8, 8, Rgb([1, 1, 1]))),
        ],
        0,
    );
    assert!(matches!(
        run(&lead, &follow, Metric::Mse),
        Err(SeamError::FrameMismatch { .. })
    ));
}

#[test]
fn cancellation_stops_the_search() {
    let lead = window(&[1, 2, 3], 0);
    let follow = window(&[1, 2, 3], 0);
    let pool = WorkerPool::new(2).expect("Failed to build worker pool");
    let token = CancellationToken::new();
    token.cancel();

    let result = search(
        &lead,
        &follow,
        Metric::Mse,
        &pool,
        Verbosity::default(),
        None,
        Some(&token),
    );
    assert!(matches!(result, Err(SeamError::Cancelled)));
}

struct RowCounter {
    rows: Mutex<Vec<(u64, Option<u64>)>>,
}

impl ProgressCallback for RowCounter {
    fn on_progress(&self, info: &ProgressInfo) {
        assert_eq!(info.operation, OperationType::Search);
        self.rows
            .lock()
            .expect("Failed to lock recorder")
            .push((info.current, info.current_frame));
    }
}

#[test]
fn progress_is_reported_per_row() {
    let lead = window(&[1, 2, 3, 4], 50);
    let follow = window(&[1, 2], 0);
    let pool = WorkerPool::new(2).expect("Failed to build worker pool");
    let counter = Arc::new(RowCounter {
        rows: Mutex::new(Vec::new()),
    });

    search(
        &lead,
        &follow,
        Metric::Mse,
        &pool,
        Verbosity::new(3),
        Some(counter.clone() as Arc<dyn ProgressCallback>),
        None,
    )
    .expect("Failed to search windows");

    let rows = counter.rows.lock().expect("Failed to lock recorder");
    assert_eq!(
        rows.as_slice(),
        &[(1, Some(50)), (2, Some(51)), (3, Some(52)), (4, Some(53))]
    );
}
