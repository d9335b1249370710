use thiserror::Error;

/// Per-frame failure. Scoped to one pipeline iteration: the frame is
/// skipped and the loop continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
