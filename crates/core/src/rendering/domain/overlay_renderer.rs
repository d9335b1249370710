use thiserror::Error;

use crate::detection::domain::landmark::DetectionResult;
use crate::rendering::domain::draw_style::DrawStyle;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("cannot draw on a {channels}-channel frame")]
    UnsupportedLayout { channels: u8 },
    #[error("frame has zero dimensions")]
    EmptyFrame,
    #[error("frame buffer does not match its dimensions")]
    BufferMismatch,
}

/// Domain interface for annotating a display frame with landmark geometry.
///
/// The caller hands over an owned working copy; implementations draw into
/// it and hand it back. With zero landmark sets the frame comes back
/// untouched.
pub trait OverlayRenderer: Send {
    fn draw(
        &self,
        frame: Frame,
        result: &DetectionResult,
        style: &DrawStyle,
    ) -> Result<Frame, RenderError>;
}
