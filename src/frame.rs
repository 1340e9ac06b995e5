//! Frame and frame-window types.
//!
//! A [`Frame`] is an 8-bit raster in one of two layouts: single-channel luma
//! or interleaved RGB. A [`FrameWindow`] is a contiguous run of frames taken
//! from one video together with the absolute index of its first frame.

use image::{GrayImage, Luma, RgbImage};

use crate::error::SeamError;

/// Whether frames are compared in full colour or as single-channel luma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// Keep the decoded RGB layout.
    Color,
    /// Convert every frame to luma with a fixed BT.601 transform. This is
    /// the default.
    #[default]
    Grayscale,
}

impl ChannelMode {
    /// Number of samples per pixel in this mode.
    pub fn channels(self) -> u8 {
        match self {
            ChannelMode::Color => 3,
            ChannelMode::Grayscale => 1,
        }
    }

    /// Human-readable name used in log output.
    pub fn name(self) -> &'static str {
        match self {
            ChannelMode::Color => "color",
            ChannelMode::Grayscale => "grayscale",
        }
    }
}

/// A decoded 8-bit video frame.
///
/// Frames are immutable once produced. All frames taken from one extraction
/// batch share the same dimensions and channel layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Single-channel luma samples.
    Gray(GrayImage),
    /// Interleaved RGB samples.
    Rgb(RgbImage),
}

impl Frame {
    /// Build a frame from a decoded RGB image, converting it to luma when
    /// `mode` is [`ChannelMode::Grayscale`].
    pub fn from_rgb(image: RgbImage, mode: ChannelMode) -> Self {
        match mode {
            ChannelMode::Color => Frame::Rgb(image),
            ChannelMode::Grayscale => Frame::Gray(luma_from_rgb(&image)),
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        match self {
            Frame::Gray(image) => image.width(),
            Frame::Rgb(image) => image.width(),
        }
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        match self {
            Frame::Gray(image) => image.height(),
            Frame::Rgb(image) => image.height(),
        }
    }

    /// The channel layout of this frame.
    pub fn channel_mode(&self) -> ChannelMode {
        match self {
            Frame::Gray(_) => ChannelMode::Grayscale,
            Frame::Rgb(_) => ChannelMode::Color,
        }
    }

    /// Samples per pixel (1 or 3).
    pub fn channels(&self) -> u8 {
        self.channel_mode().channels()
    }

    /// Tightly packed, row-major, channel-interleaved samples.
    pub fn samples(&self) -> &[u8] {
        match self {
            Frame::Gray(image) => image.as_raw(),
            Frame::Rgb(image) => image.as_raw(),
        }
    }

    /// Expand to RGB, replicating luma into all three channels.
    pub fn to_rgb_image(&self) -> RgbImage {
        match self {
            Frame::Rgb(image) => image.clone(),
            Frame::Gray(image) => RgbImage::from_fn(image.width(), image.height(), |x, y| {
                let Luma([value]) = *image.get_pixel(x, y);
                image::Rgb([value, value, value])
            }),
        }
    }

    /// Returns `true` when both frames have the same size and channel count.
    pub fn same_geometry(&self, other: &Frame) -> bool {
        self.width() == other.width()
            && self.height() == other.height()
            && self.channels() == other.channels()
    }

    /// Fail with [`SeamError::FrameMismatch`] unless `other` matches this
    /// frame's geometry.
    pub(crate) fn ensure_same_geometry(&self, other: &Frame) -> Result<(), SeamError> {
        if self.same_geometry(other) {
            return Ok(());
        }
        Err(SeamError::FrameMismatch {
            expected_width: self.width(),
            expected_height: self.height(),
            expected_channels: self.channels(),
            found_width: other.width(),
            found_height: other.height(),
            found_channels: other.channels(),
        })
    }
}

/// Convert RGB to luma using `Y = 0.299 R + 0.587 G + 0.114 B`, rounded.
pub fn luma_from_rgb(image: &RgbImage) -> GrayImage {
    let mut luma = GrayImage::new(image.width(), image.height());
    for (source, target) in image.pixels().zip(luma.pixels_mut()) {
        let [red, green, blue] = source.0;
        let weighted = 299 * u32::from(red) + 587 * u32::from(green) + 114 * u32::from(blue);
        target.0 = [((weighted + 500) / 1000) as u8];
    }
    luma
}

/// A contiguous run of frames from one video.
///
/// `offset` is the absolute frame index of `frames[0]` in the source video.
#[derive(Debug, Clone, Default)]
pub struct FrameWindow {
    /// The frames, in source order.
    pub frames: Vec<Frame>,
    /// Absolute index of the first frame.
    pub offset: u64,
}

impl FrameWindow {
    /// Create a window starting at absolute frame `offset`.
    pub fn new(frames: Vec<Frame>, offset: u64) -> Self {
        Self { frames, offset }
    }

    /// Number of frames in the window.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if the window holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Absolute frame index of the window element at `position`.
    pub fn absolute_index(&self, position: usize) -> u64 {
        self.offset + position as u64
    }
}
