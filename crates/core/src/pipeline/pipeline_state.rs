use std::fmt;

use crate::video::domain::display_sink::KeyCode;

/// Lifecycle of a [`FramePipeline`](super::frame_pipeline::FramePipeline).
///
/// `Uninitialized -> Running -> Draining -> Closed`; `shutdown` jumps
/// straight to `Closed` from any state and nothing leaves `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Running,
    Draining,
    Closed,
}

impl PipelineState {
    /// States `shutdown` still has resources to release in.
    pub fn holds_resources(self) -> bool {
        matches!(self, PipelineState::Running | PipelineState::Draining)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the loop left `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    QuitKey(KeyCode),
    WindowClosed,
    ShutdownRequested,
    /// Too many consecutive read errors.
    SourceDisconnected,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::QuitKey(key) => write!(f, "quit key {}", key.masked()),
            StopReason::WindowClosed => write!(f, "window closed"),
            StopReason::ShutdownRequested => write!(f, "shutdown requested"),
            StopReason::SourceDisconnected => write!(f, "source disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_states_hold_resources() {
        assert!(!PipelineState::Uninitialized.holds_resources());
        assert!(PipelineState::Running.holds_resources());
        assert!(PipelineState::Draining.holds_resources());
        assert!(!PipelineState::Closed.holds_resources());
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::QuitKey(KeyCode(0x1001B)).to_string(), "quit key 27");
        assert_eq!(StopReason::EndOfStream.to_string(), "end of stream");
    }
}
