//! FFmpeg-backed video source.
//!
//! [`MediaFile`] opens a container, picks its best video stream and decodes
//! frames to RGB on demand. [`MediaOpener`] is the [`SourceOpener`] used by
//! [`FrameMatcher::new`](crate::FrameMatcher::new).
//!
//! # Example
//!
//! ```no_run
//! use seamfind::{MediaFile, VideoSource};
//!
//! let mut clip = MediaFile::open("input.mp4")?;
//! println!("{} frames at {} fps", clip.frame_count(), clip.frames_per_second());
//!
//! clip.seek(100)?;
//! if let Some(frame) = clip.read_frame()? {
//!     frame.save("frame_100.png")?;
//! }
//! # Ok::<(), seamfind::SeamError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::conversion::{frame_number_to_seek_timestamp, frame_to_buffer, pts_to_frame_number};
use crate::error::SeamError;
use crate::metadata::VideoMetadata;
use crate::source::{SourceOpener, VideoSource};

/// An open video file positioned at a frame.
///
/// Dropping the value closes the demuxer and decoder.
pub struct MediaFile {
    input_context: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    video_stream_index: usize,
    time_base: Rational,
    metadata: VideoMetadata,
    file_path: PathBuf,
    /// The frame number the next `read_frame` should return.
    next_frame: u64,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    eof_sent: bool,
}

impl Debug for MediaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaFile")
            .field("file_path", &self.file_path)
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("next_frame", &self.next_frame)
            .finish_non_exhaustive()
    }
}

impl MediaFile {
    /// Open the best video stream in the file at `path`.
    ///
    /// Initialises FFmpeg on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::SourceOpen`] if the file cannot be opened, has no
    /// video stream, or its decoder cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SeamError> {
        let path = path.as_ref();
        let open_error = |reason: String| SeamError::SourceOpen {
            path: path.to_path_buf(),
            reason,
        };

        log::debug!("Opening video file: {}", path.display());

        ffmpeg_next::init()
            .map_err(|error| open_error(format!("FFmpeg initialisation failed: {error}")))?;
        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| open_error(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| open_error("no video stream".to_string()))?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| open_error(format!("cannot create video decoder: {error}")))?;

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 && frame_rate.numerator() != 0 {
            f64::from(frame_rate)
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                f64::from(rate)
            } else {
                0.0
            }
        };

        // Prefer the container's frame count; estimate from duration otherwise.
        let frame_count = match u64::try_from(stream.frames()) {
            Ok(count) if count > 0 => count,
            _ => {
                let duration_seconds = if input_context.duration() > 0 {
                    input_context.duration() as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
                } else {
                    0.0
                };
                (duration_seconds * frames_per_second) as u64
            }
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            codec,
        };

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| open_error(format!("cannot create scaler: {error}")))?;

        log::debug!(
            "Opened {}: {}x{} {} at {:.3} fps, {} frames",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.codec,
            metadata.frames_per_second,
            metadata.frame_count
        );

        Ok(Self {
            input_context,
            decoder,
            scaler,
            video_stream_index,
            time_base,
            metadata,
            file_path: path.to_path_buf(),
            next_frame: 0,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            eof_sent: false,
        })
    }

    /// Stream metadata captured at open time.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// The path this file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn convert_current_frame(&mut self) -> Result<RgbImage, SeamError> {
        self.scaler
            .run(&self.decoded_frame, &mut self.scaled_frame)
            .map_err(|error| SeamError::VideoDecodeError(format!("scaling failed: {error}")))?;
        let width = self.metadata.width;
        let height = self.metadata.height;
        let buffer = frame_to_buffer(&self.scaled_frame, width, height, 3);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            SeamError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }
}

impl VideoSource for MediaFile {
    fn frame_count(&self) -> u64 {
        self.metadata.frame_count
    }

    fn frames_per_second(&self) -> f64 {
        self.metadata.frames_per_second
    }

    fn seek(&mut self, frame_number: u64) -> Result<(), SeamError> {
        if self.metadata.frames_per_second <= 0.0 {
            return Err(SeamError::VideoDecodeError(
                "cannot seek in a stream without a frame rate".to_string(),
            ));
        }
        let timestamp = frame_number_to_seek_timestamp(frame_number, self.metadata.frames_per_second);
        self.input_context.seek(timestamp, ..timestamp)?;
        self.decoder.flush();
        self.next_frame = frame_number;
        self.eof_sent = false;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, SeamError> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let current_frame = match self.decoded_frame.timestamp() {
                    Some(pts) => pts_to_frame_number(pts, self.time_base, self.metadata.frames_per_second),
                    None => self.next_frame,
                };
                // Keyframe seeks land early; decode forward to the target.
                if current_frame < self.next_frame {
                    continue;
                }
                let image = self.convert_current_frame()?;
                self.next_frame = current_frame + 1;
                return Ok(Some(image));
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        self.decoder.send_packet(&packet).map_err(|error| {
                            SeamError::VideoDecodeError(format!(
                                "frame {}: {error}",
                                self.next_frame
                            ))
                        })?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) => {
                    return Err(SeamError::VideoDecodeError(format!(
                        "reading packet for frame {}: {error}",
                        self.next_frame
                    )));
                }
            }
        }
    }
}

/// Opens files with [`MediaFile::open`].
#[derive(Debug, Clone, Copy)]
pub struct MediaOpener;

impl MediaOpener {
    /// Initialise FFmpeg and create an opener.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::FfmpegError`] if FFmpeg fails to initialise.
    pub fn new() -> Result<Self, SeamError> {
        ffmpeg_next::init()?;
        Ok(Self)
    }
}

impl SourceOpener for MediaOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, SeamError> {
        Ok(Box::new(MediaFile::open(path)?))
    }
}
