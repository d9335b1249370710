use std::time::Duration;

use crate::shared::frame::Frame;

/// A key press reported by a display sink. Platform codes may carry
/// modifier bits above the low byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyCode(pub i32);

impl KeyCode {
    pub const ESCAPE: KeyCode = KeyCode(27);

    /// Low byte of the code, the part compared against quit keys.
    pub fn masked(self) -> i32 {
        self.0 & 0xFF
    }

    pub fn is_any_of(self, keys: &[i32]) -> bool {
        keys.iter().any(|&k| k & 0xFF == self.masked())
    }
}

/// Presents annotated frames and reports termination requests.
///
/// Not `Send`: window-backed sinks stay on the thread that created them,
/// which is the thread driving the pipeline loop.
pub trait DisplaySink {
    fn show(&mut self, window_name: &str, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Waits up to `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> Option<KeyCode>;

    /// Whether the user closed the window.
    fn close_requested(&self) -> bool {
        false
    }

    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_strips_modifier_bits() {
        assert_eq!(KeyCode(0x1001B).masked(), 27);
        assert_eq!(KeyCode(-229).masked(), 27);
    }

    #[test]
    fn test_is_any_of() {
        assert!(KeyCode(0x10071).is_any_of(&[27, 113]));
        assert!(!KeyCode(32).is_any_of(&[27]));
        assert!(!KeyCode::ESCAPE.is_any_of(&[]));
    }
}
