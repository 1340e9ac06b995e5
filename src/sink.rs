//! Video sink capability.
//!
//! A [`VideoSink`] accepts RGB frames one at a time and produces a video.
//! The stitching utility writes through this trait, so the FFmpeg encoder
//! (`VideoEncoder`, feature `ffmpeg`) and the
//! in-memory [`MemorySink`] are interchangeable.

use image::RgbImage;

use crate::error::SeamError;

/// Destination for a stream of equally sized RGB frames.
pub trait VideoSink {
    /// Append one frame.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::VideoWriteError`] if the sink is finished or the
    /// frame cannot be written, and [`SeamError::VideoEncodeError`] if the
    /// encoder rejects it.
    fn append(&mut self, frame: &RgbImage) -> Result<(), SeamError>;

    /// Flush pending data and close the output. Appending afterwards fails.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::VideoWriteError`] if the output cannot be
    /// finalised.
    fn finish(&mut self) -> Result<(), SeamError>;
}

/// A [`VideoSink`] that keeps every frame in memory.
///
/// Frames must all have the size of the first one, the same constraint a
/// real encoder imposes.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Vec<RgbImage>,
    finished: bool,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames appended so far.
    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    /// Returns `true` once [`finish`](VideoSink::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume the sink, returning its frames.
    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }
}

impl VideoSink for MemorySink {
    fn append(&mut self, frame: &RgbImage) -> Result<(), SeamError> {
        if self.finished {
            return Err(SeamError::VideoWriteError(
                "cannot append to a finished sink".to_string(),
            ));
        }
        if let Some(first) = self.frames.first() {
            if first.dimensions() != frame.dimensions() {
                return Err(SeamError::VideoWriteError(format!(
                    "frame is {}x{}, expected {}x{}",
                    frame.width(),
                    frame.height(),
                    first.width(),
                    first.height()
                )));
            }
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SeamError> {
        self.finished = true;
        Ok(())
    }
}
