//! Video stream metadata.

/// Properties of the video stream read by [`MediaFile`](crate::MediaFile).
///
/// Captured once when the file is opened.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frames per second (may be approximate for variable-frame-rate
    /// content).
    pub frames_per_second: f64,
    /// Frame count from the container, or an estimate from duration and frame
    /// rate when the container does not record one.
    pub frame_count: u64,
    /// Decoder name (e.g. `"h264"`, `"mpeg4"`).
    pub codec: String,
}

impl VideoMetadata {
    /// Duration in seconds implied by the frame count and rate.
    pub fn duration_seconds(&self) -> f64 {
        if self.frames_per_second > 0.0 {
            self.frame_count as f64 / self.frames_per_second
        } else {
            0.0
        }
    }
}
