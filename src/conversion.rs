//! Conversions between FFmpeg frames and timestamps and this crate's types.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy the first plane of a packed video frame into a tightly packed buffer,
/// dropping any row padding.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = width as usize * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_length {
        return data[..row_length * height as usize].to_vec();
    }
    data.chunks(stride)
        .take(height as usize)
        .flat_map(|row| &row[..row_length])
        .copied()
        .collect()
}

/// Copy a packed RGB image into the first plane of `video_frame`, honouring
/// its stride.
pub(crate) fn buffer_to_frame(rgb: &[u8], width: u32, video_frame: &mut VideoFrame) {
    let row_length = width as usize * 3;
    let stride = video_frame.stride(0);
    let data = video_frame.data_mut(0);
    for (row, source) in rgb.chunks_exact(row_length).enumerate() {
        let start = row * stride;
        data[start..start + row_length].copy_from_slice(source);
    }
}

/// Frame number of a presentation timestamp expressed in `time_base`.
pub(crate) fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let seconds = pts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator());
    (seconds * frames_per_second).round().max(0.0) as u64
}

/// Container seek target for `frame_number`, in `AV_TIME_BASE` units
/// (microseconds), as expected by `Input::seek` on all streams.
pub(crate) fn frame_number_to_seek_timestamp(frame_number: u64, frames_per_second: f64) -> i64 {
    let seconds = frame_number as f64 / frames_per_second;
    (seconds * 1_000_000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_maps_to_nearest_frame() {
        let time_base = Rational::new(1, 12_800);
        assert_eq!(pts_to_frame_number(0, time_base, 25.0), 0);
        assert_eq!(pts_to_frame_number(512, time_base, 25.0), 1);
        assert_eq!(pts_to_frame_number(511, time_base, 25.0), 1);
    }

    #[test]
    fn seek_timestamp_is_in_microseconds() {
        assert_eq!(frame_number_to_seek_timestamp(40, 20.0), 2_000_000);
    }
}
