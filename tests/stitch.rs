//! Stitching and diagnostic image tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{GrayImage, Luma, Rgb, RgbImage};
use seamfind::{
    CancellationToken, Frame, MemoryClip, MemoryOpener, MemorySink, Seam, SeamError,
    StitchOptions, Stitcher, VideoSink, WindowSide, absolute_difference_image,
    ssim_difference_image,
};

/// Frame `index` has red channel `index`.
fn numbered_clip(count: u64, width: u32, height: u32) -> MemoryClip {
    MemoryClip::from_fn(count, 10.0, |index| {
        RgbImage::from_pixel(width, height, Rgb([index as u8, 0, 0]))
    })
}

fn red(image: &RgbImage) -> u8 {
    image.get_pixel(0, 0).0[0]
}

fn stitcher(opener: MemoryOpener, options: StitchOptions) -> Stitcher {
    Stitcher::with_opener(Arc::new(opener), options).expect("Failed to create stitcher")
}

fn two_clips() -> MemoryOpener {
    MemoryOpener::new()
        .with_clip("part1.mp4", numbered_clip(100, 8, 6))
        .with_clip("part2.mp4", numbered_clip(100, 8, 6))
}

// ── Seam ───────────────────────────────────────────────────────────

#[test]
fn seam_output_paths() {
    let seam = Seam::new("videos/part1.mp4", 1499, "videos/part2.mkv", 12);
    assert_eq!(
        seam.output_directory(Path::new("out")),
        PathBuf::from("out/part2 1499 12")
    );
    assert_eq!(seam.video_file_name(), "part2.mp4");
}

// ── Collecting ─────────────────────────────────────────────────────

#[test]
fn collect_reads_both_sides_of_the_seam() {
    let options = StitchOptions::new()
        .with_lead_seconds(2)
        .with_follow_seconds(3);
    let clip = stitcher(two_clips(), options)
        .collect(&Seam::new("part1.mp4", 60, "part2.mp4", 7))
        .expect("Failed to collect stitch frames");

    assert_eq!(clip.frames_per_second, 10.0);
    assert_eq!(clip.lead.len(), 20);
    assert_eq!(clip.follow.len(), 30);
    assert_eq!(clip.len(), 50);
    assert_eq!(red(&clip.lead[0]), 41);
    assert_eq!(red(clip.lead.last().expect("Expected a frame")), 60);
    assert_eq!(red(&clip.follow[0]), 7);

    let (last, first) = clip.boundary().expect("Expected a boundary");
    assert_eq!((red(last), red(first)), (60, 7));
}

#[test]
fn collect_near_the_clip_edges_truncates() {
    let clip = stitcher(two_clips(), StitchOptions::new())
        .collect(&Seam::new("part1.mp4", 10, "part2.mp4", 90))
        .expect("Failed to collect stitch frames");

    // Five seconds is 50 frames; only 0..=10 and 90..=99 exist.
    assert_eq!(clip.lead.len(), 11);
    assert_eq!(red(&clip.lead[0]), 0);
    assert_eq!(clip.follow.len(), 10);
}

#[test]
fn follow_frame_past_the_end_is_an_empty_window() {
    let result = stitcher(two_clips(), StitchOptions::new())
        .collect(&Seam::new("part1.mp4", 50, "part2.mp4", 500));
    assert!(matches!(
        result,
        Err(SeamError::EmptyWindow {
            side: WindowSide::Follow
        })
    ));
}

#[test]
fn missing_clip_fails_to_collect() {
    let result = stitcher(two_clips(), StitchOptions::new())
        .collect(&Seam::new("part1.mp4", 50, "part9.mp4", 0));
    assert!(matches!(result, Err(SeamError::SourceOpen { .. })));
}

#[test]
fn zero_length_options_are_rejected() {
    let opener: Arc<MemoryOpener> = Arc::new(two_clips());
    for options in [
        StitchOptions::new().with_lead_seconds(0),
        StitchOptions::new().with_follow_seconds(0),
        StitchOptions::new().with_diagnostic_height(Some(0)),
    ] {
        assert!(matches!(
            Stitcher::with_opener(opener.clone(), options),
            Err(SeamError::InvalidOptions(_))
        ));
    }
}

// ── Writing ────────────────────────────────────────────────────────

#[test]
fn write_appends_lead_then_follow_and_finishes() {
    let stitcher = stitcher(
        two_clips(),
        StitchOptions::new()
            .with_lead_seconds(1)
            .with_follow_seconds(1),
    );
    let clip = stitcher
        .collect(&Seam::new("part1.mp4", 30, "part2.mp4", 5))
        .expect("Failed to collect stitch frames");

    let mut sink = MemorySink::new();
    stitcher.write(&clip, &mut sink).expect("Failed to write stitched clip");

    assert!(sink.is_finished());
    let frames = sink.into_frames();
    let reds: Vec<u8> = frames.iter().map(red).collect();
    let expected: Vec<u8> = (21..=30).chain(5..15).collect();
    assert_eq!(reds, expected);
}

#[test]
fn cancelled_write_stops_early() {
    let token = CancellationToken::new();
    let stitcher = stitcher(
        two_clips(),
        StitchOptions::new().with_cancellation(token.clone()),
    );
    let clip = stitcher
        .collect(&Seam::new("part1.mp4", 30, "part2.mp4", 5))
        .expect("Failed to collect stitch frames");

    token.cancel();
    let mut sink = MemorySink::new();
    assert!(matches!(
        stitcher.write(&clip, &mut sink),
        Err(SeamError::Cancelled)
    ));
    assert!(sink.frames().is_empty());
    assert!(!sink.is_finished());
}

#[test]
fn memory_sink_rejects_size_changes_and_late_frames() {
    let mut sink = MemorySink::new();
    sink.append(&RgbImage::new(4, 4)).expect("Failed to append frame");
    assert!(matches!(
        sink.append(&RgbImage::new(4, 5)),
        Err(SeamError::VideoWriteError(_))
    ));

    sink.finish().expect("Failed to finish sink");
    assert!(matches!(
        sink.append(&RgbImage::new(4, 4)),
        Err(SeamError::VideoWriteError(_))
    ));
    assert_eq!(sink.frames().len(), 1);
}

// ── Diagnostics ────────────────────────────────────────────────────

#[test]
fn diagnostics_are_written_to_the_seam_directory() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let opener = MemoryOpener::new()
        .with_clip("part1.mp4", numbered_clip(50, 64, 48))
        .with_clip("part2.mp4", numbered_clip(50, 64, 48));
    let stitcher = stitcher(
        opener,
        StitchOptions::new()
            .with_lead_seconds(1)
            .with_follow_seconds(1)
            .with_diagnostic_height(Some(24)),
    );
    let seam = Seam::new("part1.mp4", 20, "part2.mp4", 20);
    let clip = stitcher.collect(&seam).expect("Failed to collect stitch frames");

    let directory = seam.output_directory(temporary_directory.path());
    let images = stitcher.write_diagnostics(&clip, &directory).expect("Failed to write diagnostics");

    assert_eq!(images.first, directory.join("first.jpg"));
    assert_eq!(images.second, directory.join("second.jpg"));
    assert_eq!(images.absolute_difference, directory.join("diff_abs.jpg"));
    assert_eq!(images.ssim_difference, directory.join("diff_ssim.jpg"));

    for path in [
        &images.first,
        &images.second,
        &images.absolute_difference,
        &images.ssim_difference,
    ] {
        let written = image::open(path).expect("Failed to read diagnostic image");
        assert_eq!((written.width(), written.height()), (32, 24));
    }
}

#[test]
fn diagnostics_at_full_resolution() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let stitcher = stitcher(
        two_clips(),
        StitchOptions::new()
            .with_lead_seconds(1)
            .with_follow_seconds(1)
            .with_diagnostic_height(None),
    );
    let clip = stitcher
        .collect(&Seam::new("part1.mp4", 20, "part2.mp4", 20))
        .expect("Failed to collect stitch frames");

    let images = stitcher
        .write_diagnostics(&clip, temporary_directory.path())
        .expect("Failed to write diagnostics");
    let written = image::open(&images.first).expect("Failed to read diagnostic image");
    assert_eq!((written.width(), written.height()), (8, 6));
}

#[test]
fn absolute_difference_is_white_where_equal() {
    let a = RgbImage::from_pixel(3, 3, Rgb([10, 200, 30]));
    let mut b = a.clone();
    b.put_pixel(1, 1, Rgb([20, 100, 30]));

    let difference = absolute_difference_image(&a, &b).expect("Failed to compute difference");
    assert_eq!(difference.get_pixel(0, 0).0, [255, 255, 255]);
    assert_eq!(difference.get_pixel(1, 1).0, [245, 155, 255]);

    assert!(matches!(
        absolute_difference_image(&a, &RgbImage::new(3, 4)),
        Err(SeamError::FrameMismatch { .. })
    ));
}

#[test]
fn ssim_difference_of_identical_frames_is_white() {
    let frame = Frame::Gray(GrayImage::from_fn(16, 16, |x, y| Luma([(x * 16 + y) as u8])));
    let map = ssim_difference_image(&frame, &frame).expect("Failed to compute SSIM difference");
    assert_eq!(map.dimensions(), (16, 16));
    assert!(map.pixels().all(|pixel| pixel.0[0] >= 254));
}

#[test]
fn ssim_difference_of_unrelated_frames_is_dark() {
    let checker = Frame::Gray(GrayImage::from_fn(16, 16, |x, y| {
        if (x + y) % 2 == 0 { Luma([0]) } else { Luma([255]) }
    }));
    let flat = Frame::Gray(GrayImage::from_pixel(16, 16, Luma([127])));

    let map = ssim_difference_image(&checker, &flat).expect("Failed to compute SSIM difference");
    let mean = map.pixels().map(|pixel| f64::from(pixel.0[0])).sum::<f64>() / 256.0;
    assert!(mean < 16.0, "mean was {mean}");
}
