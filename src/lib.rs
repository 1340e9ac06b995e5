//! # seamfind
//!
//! Find the best place to join two video clips.
//!
//! Given a *leading* clip and one or more *following* clips, `seamfind`
//! compares the last few seconds of the leading clip with the first few
//! seconds of each following clip and reports the pair of frames that look
//! most alike. Cutting the leading clip after its frame and starting the
//! following clip at its frame gives the least visible seam.
//!
//! ## Quick Start
//!
//! ### Find a seam
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # fn main() -> Result<(), seamfind::SeamError> {
//! use seamfind::{FollowOutcome, MatchOptions, Metric, find_matching_frames};
//!
//! let options = MatchOptions::new().with_seconds(2).with_metric(Metric::Ssim);
//! for outcome in find_matching_frames("part1.mp4", &["part2.mp4"], options)? {
//!     if let FollowOutcome::Matched(seam) = outcome {
//!         println!("cut after {} and resume at {}", seam.lead_index, seam.follow_index);
//!     }
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "ffmpeg"))]
//! # fn main() {}
//! ```
//!
//! ### Stitch at the seam
//!
//! ```no_run
//! # #[cfg(feature = "ffmpeg")]
//! # fn main() -> Result<(), seamfind::SeamError> {
//! use std::path::Path;
//!
//! use seamfind::{Seam, StitchOptions, Stitcher, VideoCodec, VideoEncoder, VideoEncoderOptions};
//!
//! let seam = Seam::new("part1.mp4", 1499, "part2.mp4", 12);
//! let stitcher = Stitcher::new(StitchOptions::new())?;
//! let clip = stitcher.collect(&seam)?;
//!
//! let directory = seam.output_directory(Path::new("out"));
//! stitcher.write_diagnostics(&clip, &directory)?;
//! let options = VideoEncoderOptions::default()
//!     .fps(clip.frames_per_second)
//!     .codec(VideoCodec::Mpeg4);
//! let mut encoder = VideoEncoder::create(directory.join(seam.video_file_name()), options)?;
//! stitcher.write(&clip, &mut encoder)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "ffmpeg"))]
//! # fn main() {}
//! ```
//!
//! ## Features
//!
//! - **Four metrics**: MSE, NRMSE, PSNR and Gaussian SSIM
//! - **Grayscale or colour** comparison
//! - **Downscaling** to a fixed height before comparing
//! - **Parallel search** on a dedicated worker pool, with deterministic
//!   tie-breaking
//! - **Batch matching**: one leading clip against many following clips,
//!   with per-clip failures reported instead of aborting
//! - **Progress & cancellation**: callbacks and `CancellationToken`
//! - **Stitching** with diagnostic difference images
//! - **Pluggable sources and sinks**: in-memory implementations for tests
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` | Decode and encode real files with FFmpeg; required by the `seamfind` binary |
//!
//! ## Requirements
//!
//! The `ffmpeg` feature needs the FFmpeg development libraries installed on
//! your system.

#[cfg(feature = "ffmpeg")]
mod conversion;
pub mod config;
pub mod downscale;
#[cfg(feature = "ffmpeg")]
pub mod encode;
pub mod error;
pub mod extract;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod frame;
pub mod matcher;
#[cfg(feature = "ffmpeg")]
pub mod media;
#[cfg(feature = "ffmpeg")]
pub mod metadata;
pub mod metric;
pub mod pool;
pub mod progress;
pub mod search;
pub mod sink;
pub mod source;
pub mod stitch;

pub use config::{LeadWindowAnchor, MatchOptions, Verbosity};
pub use downscale::{DEFAULT_TARGET_HEIGHT, downscale_frame, downscale_frames, scaled_dimensions};
#[cfg(feature = "ffmpeg")]
pub use encode::{VideoCodec, VideoEncoder, VideoEncoderOptions};
pub use error::{SeamError, WindowSide};
pub use extract::extract_frames;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use frame::{ChannelMode, Frame, FrameWindow, luma_from_rgb};
#[cfg(feature = "ffmpeg")]
pub use matcher::find_matching_frames;
pub use matcher::{AbsentReason, FollowOutcome, FrameMatcher};
#[cfg(feature = "ffmpeg")]
pub use media::{MediaFile, MediaOpener};
#[cfg(feature = "ffmpeg")]
pub use metadata::VideoMetadata;
pub use metric::{Direction, Metric, ssim_map};
pub use pool::{FALLBACK_WORKER_COUNT, WorkerPool, default_worker_count};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use search::{MatchResult, search};
pub use sink::{MemorySink, VideoSink};
pub use source::{MemoryClip, MemoryOpener, MemorySource, SourceOpener, VideoSource};
pub use stitch::{
    DiagnosticImages, Seam, StitchOptions, StitchedClip, Stitcher, absolute_difference_image,
    ssim_difference_image,
};
