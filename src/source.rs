//! Video source capability.
//!
//! The matching engine never talks to a decoder directly. It goes through
//! [`SourceOpener`] to obtain a [`VideoSource`], reads a window of frames,
//! and drops the source. The FFmpeg-backed implementation lives in
//! `MediaFile` (feature `ffmpeg`); this module also provides an
//! in-memory implementation used for synthetic clips and tests.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//!
//! use image::{Rgb, RgbImage};
//! use seamfind::{MemoryClip, MemoryOpener, SourceOpener, VideoSource};
//!
//! let clip = MemoryClip::from_fn(10, 25.0, |_| RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])));
//! let opener = MemoryOpener::new().with_clip("lead.avi", clip);
//!
//! let mut source = opener.open(Path::new("lead.avi"))?;
//! assert_eq!(source.frame_count(), 10);
//! source.seek(8)?;
//! assert!(source.read_frame()?.is_some());
//! assert!(source.read_frame()?.is_some());
//! assert!(source.read_frame()?.is_none());
//! # Ok::<(), seamfind::SeamError>(())
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::RgbImage;

use crate::error::SeamError;

/// An open, seekable stream of decoded RGB frames.
///
/// Dropping the value releases the underlying decoder.
pub trait VideoSource {
    /// Total number of frames reported by the container (may be estimated).
    fn frame_count(&self) -> u64;

    /// Frames per second reported by the container.
    fn frames_per_second(&self) -> f64;

    /// Position the read cursor so the next [`read_frame`](VideoSource::read_frame)
    /// returns frame `frame_number`, as closely as the decoder allows.
    fn seek(&mut self, frame_number: u64) -> Result<(), SeamError>;

    /// Decode the frame under the cursor and advance.
    ///
    /// Returns `Ok(None)` at end of stream.
    fn read_frame(&mut self) -> Result<Option<RgbImage>, SeamError>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn frame_count(&self) -> u64 {
        (**self).frame_count()
    }

    fn frames_per_second(&self) -> f64 {
        (**self).frames_per_second()
    }

    fn seek(&mut self, frame_number: u64) -> Result<(), SeamError> {
        (**self).seek(frame_number)
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, SeamError> {
        (**self).read_frame()
    }
}

/// Opens [`VideoSource`]s by path.
pub trait SourceOpener: Send + Sync {
    /// Open the video at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::SourceOpen`] when the file is missing, unreadable,
    /// or not a decodable video.
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, SeamError>;
}

/// A clip held entirely in memory.
///
/// Cloning is cheap; the frames are shared.
#[derive(Debug, Clone)]
pub struct MemoryClip {
    frames: Arc<Vec<RgbImage>>,
    frames_per_second: f64,
    decode_error_at: Option<u64>,
}

impl MemoryClip {
    /// Wrap a list of frames played back at `frames_per_second`.
    pub fn new(frames: Vec<RgbImage>, frames_per_second: f64) -> Self {
        Self {
            frames: Arc::new(frames),
            frames_per_second,
            decode_error_at: None,
        }
    }

    /// Build `count` frames by calling `generator` with each frame index.
    pub fn from_fn<F>(count: u64, frames_per_second: f64, generator: F) -> Self
    where
        F: FnMut(u64) -> RgbImage,
    {
        Self::new((0..count).map(generator).collect(), frames_per_second)
    }

    /// Make reads of frame `frame_number` fail with a decode error.
    #[must_use]
    pub fn with_decode_error_at(mut self, frame_number: u64) -> Self {
        self.decode_error_at = Some(frame_number);
        self
    }

    /// Open a fresh cursor over this clip.
    pub fn source(&self) -> MemorySource {
        MemorySource {
            clip: self.clone(),
            cursor: 0,
        }
    }
}

/// A [`VideoSource`] over a [`MemoryClip`].
#[derive(Debug, Clone)]
pub struct MemorySource {
    clip: MemoryClip,
    cursor: u64,
}

impl VideoSource for MemorySource {
    fn frame_count(&self) -> u64 {
        self.clip.frames.len() as u64
    }

    fn frames_per_second(&self) -> f64 {
        self.clip.frames_per_second
    }

    fn seek(&mut self, frame_number: u64) -> Result<(), SeamError> {
        self.cursor = frame_number;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, SeamError> {
        if self.clip.decode_error_at == Some(self.cursor) {
            return Err(SeamError::VideoDecodeError(format!(
                "corrupt data at frame {}",
                self.cursor
            )));
        }
        let frame = usize::try_from(self.cursor)
            .ok()
            .and_then(|index| self.clip.frames.get(index))
            .cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }
}

/// A [`SourceOpener`] that serves registered [`MemoryClip`]s by path.
///
/// Opening a path that was never registered fails with
/// [`SeamError::SourceOpen`], mirroring a missing file on disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    clips: HashMap<PathBuf, MemoryClip>,
}

impl MemoryOpener {
    /// Create an opener with no clips.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `clip` under `path`.
    #[must_use]
    pub fn with_clip<P: Into<PathBuf>>(mut self, path: P, clip: MemoryClip) -> Self {
        self.clips.insert(path.into(), clip);
        self
    }
}

impl SourceOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, SeamError> {
        let clip = self.clips.get(path).ok_or_else(|| SeamError::SourceOpen {
            path: path.to_path_buf(),
            reason: "No such file".to_string(),
        })?;
        Ok(Box::new(clip.source()))
    }
}
