
use crate::shared::error::FrameError;

/// Channel order of the first three channels of a [`Frame`].
///
/// A fourth (alpha) channel, when present, always trails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Rgb,
    Bgr,
}

impl ColorSpace {
    /// Index of the red channel within a pixel.
    pub fn red_index(self) -> usize {
        match self {
            ColorSpace::Rgb => 0,
            ColorSpace::Bgr => 2,
        }
    }

    /// Reorders an RGB triple into this channel order.
    pub fn from_rgb(self, rgb: [u8; 3]) -> [u8; 3] {
        match self {
            ColorSpace::Rgb => rgb,
            ColorSpace::Bgr => [rgb[2], rgb[1], rgb[0]],
        }
    }
}

/// A single video frame: contiguous pixel bytes in row-major order.
///
/// Frames are owned by one pipeline stage at a time and move down the
/// pipeline; a stage that needs the original afterwards clones it.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    color_space: ColorSpace,
    index: usize,
}

impl Frame {
    /// Builds an RGB frame. Panics in debug builds when the buffer length
    /// does not match the dimensions; use [`Frame::try_new`] for untrusted
    /// input.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            color_space: ColorSpace::Rgb,
            index,
        }
    }

    /// Checked constructor for buffers coming from capture devices.
    pub fn try_new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        color_space: ColorSpace,
        index: usize,
    ) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize) * (channels as usize);
        if data.len() != expected {
            return Err(FrameError::InvalidFrame(format!(
                "buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            color_space,
            index,
        })
    }

    /// Checks the layout every processing stage relies on: non-zero size,
    /// 3 or 4 channels and a buffer of exactly `w * h * c` bytes.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::InvalidFrame(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        if !matches!(self.channels, 3 | 4) {
            return Err(FrameError::InvalidFrame(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        let expected =
            (self.width as usize) * (self.height as usize) * (self.channels as usize);
        if self.data.len() != expected {
            return Err(FrameError::InvalidFrame(format!(
                "buffer holds {} bytes for a {}x{}x{} frame",
                self.data.len(),
                self.width,
                self.height,
                self.channels
            )));
        }
        Ok(())
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Pixel value at `(x, y)` as RGB regardless of the frame's channel order.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let c = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * c;
        let px = &self.data[offset..offset + 3];
        match self.color_space {
            ColorSpace::Rgb => [px[0], px[1], px[2]],
            ColorSpace::Bgr => [px[2], px[1], px[0]],
        }
    }

    /// Rec. 601 luma of the pixel at `(x, y)`, in `[0, 255]`.
    pub fn luma_at(&self, x: u32, y: u32) -> f32 {
        let [r, g, b] = self.rgb_at(x, y);
        0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
    }
}
