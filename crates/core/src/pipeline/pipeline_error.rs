use thiserror::Error;

use crate::detection::domain::landmark_detector::DetectorInitError;

/// Failures that keep a pipeline from reaching `Running`.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("detector initialization failed: {0}")]
    Detector(#[from] DetectorInitError),
    #[error("failed to open frame source: {0}")]
    Source(String),
    #[error("pipeline is closed and cannot be restarted")]
    AlreadyClosed,
    #[error("pipeline is already running")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_error_is_wrapped_with_cause() {
        let err: StartupError = DetectorInitError::AlreadyInitialized.into();
        assert!(matches!(
            err,
            StartupError::Detector(DetectorInitError::AlreadyInitialized)
        ));
        assert_eq!(
            err.to_string(),
            "detector initialization failed: detector is already initialized"
        );
    }
}
