//! End-to-end matching tests over in-memory clips.

use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};
use seamfind::{
    AbsentReason, CancellationToken, ChannelMode, FollowOutcome, FrameMatcher, LeadWindowAnchor,
    MatchOptions, MemoryClip, MemoryOpener, Metric, OperationType, ProgressCallback, ProgressInfo,
    SeamError, WindowSide,
};

const RED: [u8; 3] = [255, 0, 0];
const GREEN: [u8; 3] = [0, 255, 0];
const BLUE: [u8; 3] = [0, 0, 255];

fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(rgb))
}

/// `count` frames of `background` with `marker` at `marker_at`.
fn marked_clip(count: u64, fps: f64, background: [u8; 3], marker: [u8; 3], marker_at: u64) -> MemoryClip {
    MemoryClip::from_fn(count, fps, |index| {
        if index == marker_at {
            solid(8, 8, marker)
        } else {
            solid(8, 8, background)
        }
    })
}

/// A 500 frame blue lead ending in red, and a green follow with red at 15.
fn standard_opener() -> MemoryOpener {
    MemoryOpener::new()
        .with_clip("lead.mp4", marked_clip(500, 20.0, BLUE, RED, 499))
        .with_clip("follow.mp4", marked_clip(200, 20.0, GREEN, RED, 15))
}

fn matcher(opener: MemoryOpener, options: MatchOptions) -> FrameMatcher {
    FrameMatcher::with_opener(Arc::new(opener), options).expect("Failed to create matcher")
}

fn base_options() -> MatchOptions {
    MatchOptions::new().with_seconds(2).with_downscale(false)
}

fn single(outcomes: &[FollowOutcome]) -> (u64, u64, f64) {
    assert_eq!(outcomes.len(), 1);
    let result = outcomes[0]
        .match_result()
        .unwrap_or_else(|| panic!("Expected a match, got: {:?}", outcomes[0]));
    (result.lead_index, result.follow_index, result.score)
}

// ── Metrics end to end ─────────────────────────────────────────────

#[test]
fn mse_finds_the_marker_frames() {
    let matcher = matcher(standard_opener(), base_options().with_metric(Metric::Mse));
    let outcomes = matcher.run("lead.mp4", &["follow.mp4"]).expect("Failed to match clips");
    assert_eq!(single(&outcomes), (499, 15, 0.0));
}

#[test]
fn psnr_finds_the_marker_frames() {
    let matcher = matcher(standard_opener(), base_options().with_metric(Metric::Psnr));
    let outcomes = matcher.run("lead.mp4", &["follow.mp4"]).expect("Failed to match clips");
    assert_eq!(single(&outcomes), (499, 15, f64::INFINITY));
}

#[test]
fn ssim_and_nrmse_find_the_marker_frames() {
    for metric in [Metric::Ssim, Metric::Nrmse] {
        let matcher = matcher(standard_opener(), base_options().with_metric(metric));
        let outcomes = matcher.run("lead.mp4", &["follow.mp4"]).expect("Failed to match clips");
        let (lead, follow, _) = single(&outcomes);
        assert_eq!((lead, follow), (499, 15), "metric {metric}");
    }
}

#[test]
fn colour_mode_finds_the_marker_frames() {
    let options = base_options().with_channel_mode(ChannelMode::Color);
    let matcher = matcher(standard_opener(), options);
    let outcomes = matcher.run("lead.mp4", &["follow.mp4"]).expect("Failed to match clips");
    assert_eq!(single(&outcomes), (499, 15, 0.0));
}

#[test]
fn downscaled_windows_still_match() {
    let lead = MemoryClip::from_fn(100, 10.0, |index| {
        solid(64, 48, if index == 97 { RED } else { BLUE })
    });
    let follow = MemoryClip::from_fn(30, 10.0, |index| {
        solid(32, 24, if index == 4 { RED } else { GREEN })
    });
    let opener = MemoryOpener::new()
        .with_clip("lead.mp4", lead)
        .with_clip("follow.mp4", follow);

    let options = MatchOptions::new()
        .with_seconds(1)
        .with_downscale(true)
        .with_target_height(12);
    let outcomes = matcher(opener, options)
        .run("lead.mp4", &["follow.mp4"])
        .expect("Failed to match clips");
    let (lead, follow, _) = single(&outcomes);
    assert_eq!((lead, follow), (97, 4));
}

#[test]
fn follower_with_another_aspect_ratio_is_skipped() {
    let lead = MemoryClip::from_fn(100, 10.0, |index| {
        solid(64, 36, if index == 97 { RED } else { BLUE })
    });
    let wide = MemoryClip::from_fn(30, 10.0, |index| {
        solid(64, 36, if index == 4 { RED } else { GREEN })
    });
    let four_three = MemoryClip::from_fn(30, 10.0, |_| solid(48, 36, RED));
    let opener = MemoryOpener::new()
        .with_clip("lead.mp4", lead)
        .with_clip("wide.mp4", wide)
        .with_clip("four_three.mp4", four_three);

    let options = MatchOptions::new()
        .with_seconds(1)
        .with_downscale(true)
        .with_target_height(18);
    let outcomes = matcher(opener, options)
        .run("lead.mp4", &["wide.mp4", "four_three.mp4", "wide.mp4"])
        .expect("Failed to match clips");

    assert_eq!(outcomes.len(), 3);
    for index in [0, 2] {
        let best = outcomes[index].match_result().expect("Expected a match");
        assert_eq!((best.lead_index, best.follow_index), (97, 4));
    }
    match &outcomes[1] {
        FollowOutcome::Absent { path, reason } => {
            assert_eq!(path, std::path::Path::new("four_three.mp4"));
            assert_eq!(
                reason,
                &AbsentReason::GeometryMismatch {
                    expected: (32, 18, 1),
                    found: (24, 18, 1),
                }
            );
        }
        other => panic!("Expected Absent, got: {other:?}"),
    }
}

#[test]
fn lead_window_with_mixed_sizes_is_an_error() {
    let lead = MemoryClip::from_fn(20, 10.0, |index| {
        if index == 15 { solid(16, 16, BLUE) } else { solid(8, 8, BLUE) }
    });
    let opener = MemoryOpener::new()
        .with_clip("lead.mp4", lead)
        .with_clip("follow.mp4", MemoryClip::from_fn(20, 10.0, |_| solid(8, 8, BLUE)));
    let options = MatchOptions::new().with_seconds(1).with_downscale(false);
    let result = matcher(opener, options).run("lead.mp4", &["follow.mp4"]);
    assert!(matches!(result, Err(SeamError::FrameMismatch { .. })));
}

// ── Window placement ───────────────────────────────────────────────

#[test]
fn legacy_anchor_misses_the_final_frame() {
    let options = base_options().with_lead_anchor(LeadWindowAnchor::Legacy);
    let outcomes = matcher(standard_opener(), options)
        .run("lead.mp4", &["follow.mp4"])
        .expect("Failed to match clips");

    // The window is 459..=498, so only blue leading frames are searched.
    // Blue (29) is closest to red (76); every row ties, the first wins.
    assert_eq!(single(&outcomes), (459, 15, 47.0 * 47.0));
}

#[test]
fn window_length_uses_whole_frames_per_second() {
    // 29.97 fps * 2 s reads 58 frames: 42..=99.
    let opener = MemoryOpener::new()
        .with_clip("lead.mp4", marked_clip(100, 29.97, BLUE, RED, 42))
        .with_clip("follow.mp4", marked_clip(100, 29.97, GREEN, RED, 57));
    let outcomes = matcher(opener, base_options())
        .run("lead.mp4", &["follow.mp4"])
        .expect("Failed to match clips");
    assert_eq!(single(&outcomes), (42, 57, 0.0));
}

#[test]
fn short_lead_clip_is_read_from_the_start() {
    let opener = MemoryOpener::new()
        .with_clip("lead.mp4", marked_clip(10, 20.0, BLUE, RED, 0))
        .with_clip("follow.mp4", marked_clip(200, 20.0, GREEN, RED, 15));
    let outcomes = matcher(opener, base_options())
        .run("lead.mp4", &["follow.mp4"])
        .expect("Failed to match clips");
    assert_eq!(single(&outcomes), (0, 15, 0.0));
}

// ── Batches and failures ───────────────────────────────────────────

#[test]
fn missing_following_clip_does_not_abort_the_batch() {
    let opener = standard_opener().with_clip("second.mp4", marked_clip(60, 20.0, GREEN, RED, 30));
    let outcomes = matcher(opener, base_options())
        .run("lead.mp4", &["follow.mp4", "missing.mp4", "second.mp4"])
        .expect("Failed to match clips");

    assert_eq!(outcomes.len(), 3);
    assert_eq!(
        outcomes[0].match_result().map(|r| (r.lead_index, r.follow_index)),
        Some((499, 15))
    );
    match &outcomes[1] {
        FollowOutcome::Absent { path, reason } => {
            assert_eq!(path.to_str(), Some("missing.mp4"));
            assert_eq!(reason, &AbsentReason::OpenFailed("No such file".to_string()));
        }
        other => panic!("Expected Absent, got: {other:?}"),
    }
    assert_eq!(
        outcomes[2].match_result().map(|r| (r.lead_index, r.follow_index)),
        Some((499, 30))
    );
}

#[test]
fn empty_following_clip_is_reported_absent() {
    let opener = standard_opener()
        .with_clip("empty.mp4", MemoryClip::new(Vec::new(), 20.0))
        .with_clip("corrupt.mp4", marked_clip(60, 20.0, GREEN, RED, 5).with_decode_error_at(0));
    let outcomes = matcher(opener, base_options())
        .run("lead.mp4", &["empty.mp4", "corrupt.mp4"])
        .expect("Failed to match clips");

    for outcome in &outcomes {
        assert!(!outcome.is_matched());
        assert!(matches!(
            outcome,
            FollowOutcome::Absent {
                reason: AbsentReason::EmptyWindow,
                ..
            }
        ));
    }
}

#[test]
fn truncated_following_clip_is_searched_as_far_as_it_reads() {
    let follow = marked_clip(60, 20.0, GREEN, RED, 8).with_decode_error_at(12);
    let opener = standard_opener().with_clip("truncated.mp4", follow);
    let outcomes = matcher(opener, base_options())
        .run("lead.mp4", &["truncated.mp4"])
        .expect("Failed to match clips");
    assert_eq!(single(&outcomes), (499, 8, 0.0));
}

#[test]
fn missing_lead_clip_fails_the_call() {
    let result = matcher(standard_opener(), base_options()).run("nope.mp4", &["follow.mp4"]);
    match result {
        Err(SeamError::SourceOpen { path, .. }) => assert_eq!(path.to_str(), Some("nope.mp4")),
        other => panic!("Expected SourceOpen, got: {other:?}"),
    }
}

#[test]
fn empty_lead_clip_fails_the_call() {
    let opener = standard_opener().with_clip("empty.mp4", MemoryClip::new(Vec::new(), 20.0));
    let result = matcher(opener, base_options()).run("empty.mp4", &["follow.mp4"]);
    assert!(matches!(
        result,
        Err(SeamError::EmptyWindow {
            side: WindowSide::Lead
        })
    ));
}

#[test]
fn no_following_clips_gives_no_outcomes() {
    let empty: [&str; 0] = [];
    let outcomes = matcher(standard_opener(), base_options())
        .run("lead.mp4", &empty)
        .expect("Failed to match clips");
    assert!(outcomes.is_empty());
}

// ── Determinism and control ────────────────────────────────────────

#[test]
fn results_do_not_depend_on_thread_count() {
    let clip = |seed: u64| {
        MemoryClip::from_fn(120, 20.0, move |index| {
            RgbImage::from_fn(12, 12, |x, y| {
                let value = (index * 31 + seed * 7 + u64::from(x) * 5 + u64::from(y) * 3) % 256;
                Rgb([value as u8, (value / 2) as u8, 255 - value as u8])
            })
        })
    };
    let opener = MemoryOpener::new()
        .with_clip("lead.mp4", clip(1))
        .with_clip("follow.mp4", clip(4));

    for metric in Metric::ALL {
        let results: Vec<Vec<FollowOutcome>> = [1, 3, 8]
            .into_iter()
            .map(|threads| {
                let options = base_options().with_metric(metric).with_threads(threads);
                matcher(opener.clone(), options)
                    .run("lead.mp4", &["follow.mp4"])
                    .expect("Failed to match clips")
            })
            .collect();
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]), "metric {metric}");
    }
}

#[test]
fn repeated_runs_reuse_the_pool() {
    let matcher = matcher(standard_opener(), base_options().with_threads(2));
    assert_eq!(matcher.worker_count(), 2);
    let first = matcher.run("lead.mp4", &["follow.mp4"]).expect("Failed to match clips");
    let second = matcher.run("lead.mp4", &["follow.mp4"]).expect("Failed to match clips");
    assert_eq!(first, second);
}

#[test]
fn cancelled_match_returns_error() {
    let token = CancellationToken::new();
    token.cancel();
    let options = base_options().with_cancellation(token);
    let result = matcher(standard_opener(), options).run("lead.mp4", &["follow.mp4"]);
    assert!(matches!(result, Err(SeamError::Cancelled)));
}

#[test]
fn invalid_options_are_rejected_up_front() {
    let opener = Arc::new(standard_opener());
    for options in [
        MatchOptions::new().with_seconds(0),
        MatchOptions::new().with_threads(0),
        MatchOptions::new().with_target_height(0),
    ] {
        assert!(matches!(
            FrameMatcher::with_opener(opener.clone(), options),
            Err(SeamError::InvalidOptions(_))
        ));
    }
}

struct OperationLog {
    operations: Mutex<Vec<OperationType>>,
}

impl ProgressCallback for OperationLog {
    fn on_progress(&self, info: &ProgressInfo) {
        let mut operations = self.operations.lock().expect("Failed to lock recorder");
        if operations.last() != Some(&info.operation) {
            operations.push(info.operation);
        }
    }
}

#[test]
fn progress_covers_every_stage() {
    let log = Arc::new(OperationLog {
        operations: Mutex::new(Vec::new()),
    });
    let lead = MemoryClip::from_fn(40, 10.0, |_| solid(32, 24, BLUE));
    let follow = MemoryClip::from_fn(40, 10.0, |_| solid(32, 24, GREEN));
    let opener = MemoryOpener::new()
        .with_clip("lead.mp4", lead)
        .with_clip("follow.mp4", follow);
    let options = MatchOptions::new()
        .with_seconds(1)
        .with_target_height(12)
        .with_progress(log.clone());

    matcher(opener, options)
        .run("lead.mp4", &["follow.mp4"])
        .expect("Failed to match clips");

    let operations = log.operations.lock().expect("Failed to lock recorder");
    assert_eq!(
        operations.as_slice(),
        &[
            OperationType::FrameExtraction,
            OperationType::Downscaling,
            OperationType::FrameExtraction,
            OperationType::Downscaling,
            OperationType::Search,
        ]
    );
}
