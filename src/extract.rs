//! Frame window extraction.
//!
//! [`extract_frames`] reads a contiguous run of frames from a
//! [`VideoSource`], converting each one to the requested
//! [`ChannelMode`]. A read that hits end of stream or a decode error stops
//! the run early and returns what was read so far; that is a truncation,
//! not a failure.
//!
//! # Example
//!
//! ```
//! use image::{Rgb, RgbImage};
//! use seamfind::{ChannelMode, MemoryClip, Verbosity, extract_frames};
//!
//! let clip = MemoryClip::from_fn(60, 20.0, |_| RgbImage::from_pixel(8, 8, Rgb([0, 0, 255])));
//! let mut source = clip.source();
//!
//! // Ask for 100 frames with only 40 left.
//! let frames = extract_frames(&mut source, 20, 100, ChannelMode::Grayscale, Verbosity::default(), None)?;
//! assert_eq!(frames.len(), 40);
//! # Ok::<(), seamfind::SeamError>(())
//! ```

use crate::config::Verbosity;
use crate::error::SeamError;
use crate::frame::{ChannelMode, Frame};
use crate::progress::{CancellationToken, ProgressTracker};
use crate::source::VideoSource;

/// Read up to `count` frames starting at absolute frame `start`.
///
/// The source cursor is left after the last frame read; the source is not
/// closed. Callers clamp `start` to the clip themselves.
///
/// # Errors
///
/// Returns [`SeamError::Cancelled`] if `cancellation` fires before a read.
/// Seek failures, decode failures and end of stream never fail the call.
pub fn extract_frames(
    source: &mut dyn VideoSource,
    start: u64,
    count: u64,
    channel_mode: ChannelMode,
    verbosity: Verbosity,
    cancellation: Option<&CancellationToken>,
) -> Result<Vec<Frame>, SeamError> {
    read_window(
        source,
        start,
        count,
        channel_mode,
        verbosity,
        cancellation,
        None,
    )
}

/// [`extract_frames`] with a progress tracker advanced once per frame.
pub(crate) fn read_window(
    source: &mut dyn VideoSource,
    start: u64,
    count: u64,
    channel_mode: ChannelMode,
    verbosity: Verbosity,
    cancellation: Option<&CancellationToken>,
    mut tracker: Option<&mut ProgressTracker>,
) -> Result<Vec<Frame>, SeamError> {
    let mut frames = Vec::with_capacity(usize::try_from(count).unwrap_or(0).min(4096));
    if count == 0 {
        return Ok(frames);
    }

    if let Err(error) = source.seek(start) {
        if verbosity.stages() {
            log::info!("Could not seek to frame {start}: {error}");
        }
        return Ok(frames);
    }

    for frame_number in start..start.saturating_add(count) {
        if cancellation.is_some_and(CancellationToken::is_cancelled) {
            return Err(SeamError::Cancelled);
        }

        match source.read_frame() {
            Ok(Some(image)) => {
                frames.push(Frame::from_rgb(image, channel_mode));
                if let Some(tracker) = tracker.as_deref_mut() {
                    tracker.advance(Some(frame_number));
                }
            }
            Ok(None) => {
                if verbosity.stages() {
                    log::info!(
                        "Short read: end of stream at frame {frame_number}, \
                         got {} of {count} frames",
                        frames.len()
                    );
                }
                break;
            }
            Err(error) => {
                if verbosity.stages() {
                    log::info!(
                        "Short read: decode failed at frame {frame_number}, \
                         got {} of {count} frames",
                        frames.len()
                    );
                }
                log::debug!("Decode error at frame {frame_number}: {error}");
                break;
            }
        }
    }

    if let Some(tracker) = tracker {
        tracker.finish();
    }
    Ok(frames)
}
