//! FFmpeg video encoder.
//!
//! [`VideoEncoder`] is the [`VideoSink`] that writes real files. The
//! container is chosen from the output extension; the codec, frame rate and
//! bit rate come from [`VideoEncoderOptions`]. The output is opened when the
//! first frame arrives, so its size can follow the frames.
//!
//! # Example
//!
//! ```no_run
//! use seamfind::{MediaFile, VideoCodec, VideoEncoder, VideoEncoderOptions, VideoSink, VideoSource};
//!
//! let mut input = MediaFile::open("input.mp4")?;
//! let options = VideoEncoderOptions::default()
//!     .fps(input.frames_per_second())
//!     .codec(VideoCodec::Mpeg4);
//! let mut encoder = VideoEncoder::create("first_second.mp4", options)?;
//! for _ in 0..input.frames_per_second() as u64 {
//!     match input.read_frame()? {
//!         Some(frame) => encoder.append(&frame)?,
//!         None => break,
//!     }
//! }
//! encoder.finish()?;
//! # Ok::<(), seamfind::SeamError>(())
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use ffmpeg_next::{
    Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    encoder::video::Encoder as OpenedVideoEncoder,
    format::{Flags as FormatFlags, Pixel, context::Output},
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{RgbImage, imageops::FilterType};

use crate::conversion::buffer_to_frame;
use crate::error::SeamError;
use crate::sink::VideoSink;

/// Options for [`VideoEncoder`].
#[derive(Debug, Clone)]
pub struct VideoEncoderOptions {
    /// Output frame rate (default: 30).
    pub frames_per_second: f64,
    /// Output width. If `None`, taken from the first frame.
    pub width: Option<u32>,
    /// Output height. If `None`, taken from the first frame.
    pub height: Option<u32>,
    /// Codec to use. Default is H.264.
    pub codec: VideoCodec,
    /// Bit rate in bits per second. If `None`, the encoder default applies.
    pub bitrate: Option<usize>,
}

impl Default for VideoEncoderOptions {
    fn default() -> Self {
        Self {
            frames_per_second: 30.0,
            width: None,
            height: None,
            codec: VideoCodec::H264,
            bitrate: None,
        }
    }
}

impl VideoEncoderOptions {
    /// Set the frame rate.
    #[must_use]
    pub fn fps(mut self, frames_per_second: f64) -> Self {
        self.frames_per_second = frames_per_second;
        self
    }

    /// Force the output resolution; frames of another size are resized.
    #[must_use]
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the codec.
    #[must_use]
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the target bit rate in bits per second.
    #[must_use]
    pub fn bitrate(mut self, bitrate: usize) -> Self {
        self.bitrate = Some(bitrate);
        self
    }
}

/// Supported output video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    H265,
    /// MPEG-4 Part 2, playable almost everywhere.
    Mpeg4,
}

impl VideoCodec {
    /// Lower-case name as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Mpeg4 => "mpeg4",
        }
    }

    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
            VideoCodec::Mpeg4 => Id::MPEG4,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoCodec {
    type Err = SeamError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" => Ok(VideoCodec::H264),
            "h265" | "hevc" => Ok(VideoCodec::H265),
            "mpeg4" | "mp4v" => Ok(VideoCodec::Mpeg4),
            _ => Err(SeamError::InvalidOptions(format!("unknown codec '{name}'"))),
        }
    }
}

/// Everything that exists once the output file is open.
struct OpenOutput {
    output: Output,
    encoder: OpenedVideoEncoder,
    scaler: ScalingContext,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    width: u32,
    height: u32,
}

/// Streams RGB frames into a video file.
///
/// Create with [`VideoEncoder::create`], feed frames with
/// [`append`](VideoSink::append) and close with
/// [`finish`](VideoSink::finish). An encoder dropped without finishing is
/// finished on drop, with any error logged.
pub struct VideoEncoder {
    path: PathBuf,
    options: VideoEncoderOptions,
    state: Option<OpenOutput>,
    frames_written: i64,
    finished: bool,
}

impl fmt::Debug for VideoEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoEncoder")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("frames_written", &self.frames_written)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl VideoEncoder {
    /// Prepare an encoder writing to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::InvalidOptions`] for a non-positive frame rate
    /// and [`SeamError::FfmpegError`] if FFmpeg cannot be initialised.
    pub fn create<P: AsRef<Path>>(path: P, options: VideoEncoderOptions) -> Result<Self, SeamError> {
        if options.frames_per_second.is_nan() || options.frames_per_second <= 0.0 {
            return Err(SeamError::InvalidOptions(format!(
                "frame rate must be positive, got {}",
                options.frames_per_second
            )));
        }
        ffmpeg_next::init()?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            options,
            state: None,
            frames_written: 0,
            finished: false,
        })
    }

    /// Number of frames appended so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written as u64
    }

    fn open(&self, width: u32, height: u32) -> Result<OpenOutput, SeamError> {
        log::info!(
            "Writing {} ({}x{}, codec={}, fps={:.3})",
            self.path.display(),
            width,
            height,
            self.options.codec,
            self.options.frames_per_second
        );

        let codec_id = self.options.codec.to_codec_id();
        let mut output = ffmpeg_next::format::output(&self.path)
            .map_err(|error| SeamError::VideoWriteError(format!("cannot open output: {error}")))?;
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let encoder_codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            SeamError::VideoEncodeError(format!("codec {codec_id:?} not available"))
        })?;

        let mut stream = output
            .add_stream(encoder_codec)
            .map_err(|error| SeamError::VideoWriteError(format!("cannot add stream: {error}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.encoder().video())
            .map_err(|error| {
                SeamError::VideoEncodeError(format!("cannot create video encoder: {error}"))
            })?;

        let frame_rate = Rational::from(self.options.frames_per_second);
        let encoder_time_base = frame_rate.invert();
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(frame_rate));
        if let Some(bitrate) = self.options.bitrate {
            encoder.set_bit_rate(bitrate);
        }
        if needs_global_header {
            // SAFETY: the context is owned by `encoder` and not yet opened.
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let encoder = encoder
            .open_as(encoder_codec)
            .map_err(|error| SeamError::VideoEncodeError(format!("cannot open encoder: {error}")))?;
        stream.set_parameters(&encoder);

        output
            .write_header()
            .map_err(|error| SeamError::VideoWriteError(format!("cannot write header: {error}")))?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| SeamError::VideoWriteError("output stream disappeared".to_string()))?;

        let scaler = ScalingContext::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| SeamError::VideoWriteError(format!("cannot create scaler: {error}")))?;

        Ok(OpenOutput {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            width,
            height,
        })
    }
}

impl OpenOutput {
    fn drain_packets(&mut self) -> Result<(), SeamError> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|error| SeamError::VideoWriteError(format!("write packet failed: {error}")))?;
        }
        Ok(())
    }
}

impl VideoSink for VideoEncoder {
    fn append(&mut self, frame: &RgbImage) -> Result<(), SeamError> {
        if self.finished {
            return Err(SeamError::VideoWriteError(
                "cannot append to a finished encoder".to_string(),
            ));
        }
        if self.state.is_none() {
            let width = self.options.width.unwrap_or(frame.width());
            let height = self.options.height.unwrap_or(frame.height());
            self.state = Some(self.open(width, height)?);
        }
        let Some(state) = self.state.as_mut() else {
            return Err(SeamError::VideoWriteError("encoder is not open".to_string()));
        };

        let resized;
        let rgb = if frame.dimensions() == (state.width, state.height) {
            frame
        } else {
            resized = image::imageops::resize(frame, state.width, state.height, FilterType::Lanczos3);
            &resized
        };

        let mut source_frame = VideoFrame::new(Pixel::RGB24, state.width, state.height);
        buffer_to_frame(rgb.as_raw(), state.width, &mut source_frame);
        let mut yuv_frame = VideoFrame::empty();
        state
            .scaler
            .run(&source_frame, &mut yuv_frame)
            .map_err(|error| SeamError::VideoWriteError(format!("scaling failed: {error}")))?;
        yuv_frame.set_pts(Some(self.frames_written));
        self.frames_written += 1;

        state
            .encoder
            .send_frame(&yuv_frame)
            .map_err(|error| SeamError::VideoEncodeError(format!("send_frame failed: {error}")))?;
        state.drain_packets()
    }

    fn finish(&mut self) -> Result<(), SeamError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let Some(mut state) = self.state.take() else {
            return Err(SeamError::VideoWriteError("no frames to write".to_string()));
        };
        state
            .encoder
            .send_eof()
            .map_err(|error| SeamError::VideoEncodeError(format!("send_eof failed: {error}")))?;
        state.drain_packets()?;
        state
            .output
            .write_trailer()
            .map_err(|error| SeamError::VideoWriteError(format!("cannot write trailer: {error}")))?;
        log::debug!(
            "Finished {} after {} frames",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        if self.state.is_some() && !self.finished {
            if let Err(error) = self.finish() {
                log::warn!("Failed to finish {}: {error}", self.path.display());
            }
        }
    }
}
