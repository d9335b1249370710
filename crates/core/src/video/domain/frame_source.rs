use std::fmt;
use std::path::PathBuf;

use crate::shared::frame::Frame;

/// Which device or stream a [`FrameSource`] should open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceId {
    /// Camera index, e.g. `0` for the first capture device.
    Index(u32),
    /// File path, device node or URL.
    Path(String),
}

impl DeviceId {
    /// Numeric strings become camera indices, anything else a path.
    pub fn parse(s: &str) -> Self {
        match s.parse::<u32>() {
            Ok(index) => DeviceId::Index(index),
            Err(_) => DeviceId::Path(s.to_string()),
        }
    }

    /// Filesystem location for this device. Indices map to V4L2 nodes.
    pub fn to_path(&self) -> PathBuf {
        match self {
            DeviceId::Index(i) => PathBuf::from(format!("/dev/video{i}")),
            DeviceId::Path(p) => PathBuf::from(p),
        }
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        DeviceId::Index(0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Index(i) => write!(f, "camera {i}"),
            DeviceId::Path(p) => write!(f, "{p}"),
        }
    }
}

/// What an opened source reports about its stream.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate, 0.0 when unknown.
    pub fps: f64,
    pub description: String,
}

/// Outcome of a successful read.
#[derive(Debug)]
pub enum FrameRead {
    Frame(Frame),
    EndOfStream,
}

/// Pulls frames from a camera-like device, in arrival order.
pub trait FrameSource: Send {
    fn open(&mut self, device: &DeviceId) -> Result<SourceInfo, Box<dyn std::error::Error>>;

    /// Blocks until the next frame is available or the stream ends.
    fn read_frame(&mut self) -> Result<FrameRead, Box<dyn std::error::Error>>;

    /// Releases the device. Safe to call more than once.
    fn close(&mut self);
}
