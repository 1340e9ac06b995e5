//! Frame downscaling.
//!
//! Both windows of a search are resized to the same height before
//! comparison, which makes the metrics cheaper and less sensitive to
//! encoder noise. Width follows the source aspect ratio.

use image::imageops::{self, FilterType};

use crate::frame::Frame;
use crate::pool::WorkerPool;

/// Height frames are resized to when downscaling is enabled.
pub const DEFAULT_TARGET_HEIGHT: u32 = 480;

/// Output size for a `width`×`height` frame resized to `target_height` rows.
///
/// The height is exact; the width is the aspect-preserving value rounded to
/// the nearest pixel, never less than one.
///
/// ```
/// use seamfind::scaled_dimensions;
///
/// assert_eq!(scaled_dimensions(1920, 1080, 480), (853, 480));
/// assert_eq!(scaled_dimensions(640, 480, 480), (640, 480));
/// ```
pub fn scaled_dimensions(width: u32, height: u32, target_height: u32) -> (u32, u32) {
    if height == 0 {
        return (width.max(1), target_height);
    }
    let scale = f64::from(target_height) / f64::from(height);
    let target_width = (f64::from(width) * scale).round() as u32;
    (target_width.max(1), target_height)
}

/// Resize one frame to `target_height` rows, keeping its channel layout.
///
/// Uses Lanczos resampling, which low-pass filters when minifying.
pub fn downscale_frame(frame: &Frame, target_height: u32) -> Frame {
    let (width, height) = scaled_dimensions(frame.width(), frame.height(), target_height);
    if (width, height) == (frame.width(), frame.height()) {
        return frame.clone();
    }
    match frame {
        Frame::Gray(image) => Frame::Gray(imageops::resize(image, width, height, FilterType::Lanczos3)),
        Frame::Rgb(image) => Frame::Rgb(imageops::resize(image, width, height, FilterType::Lanczos3)),
    }
}

/// Resize every frame on `pool`, preserving order.
pub fn downscale_frames(frames: &[Frame], target_height: u32, pool: &WorkerPool) -> Vec<Frame> {
    pool.map(frames, |frame| downscale_frame(frame, target_height))
}
