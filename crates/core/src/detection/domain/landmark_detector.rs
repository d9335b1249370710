use std::path::PathBuf;

use thiserror::Error;

use crate::detection::domain::landmark::DetectionResult;
use crate::shared::frame::Frame;

/// Model or configuration failure while bringing a detector up. Fatal:
/// a pipeline whose detector fails to initialize never starts running.
#[derive(Error, Debug)]
pub enum DetectorInitError {
    #[error("model file not found: {0}")]
    MissingModel(PathBuf),
    #[error("failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),
    #[error("detector is already initialized")]
    AlreadyInitialized,
}

/// Thresholds and limits handed to [`LandmarkDetector::initialize`].
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Face box score needed to start tracking a new face.
    pub min_detection_confidence: f32,
    /// Landmark presence score needed to keep (and report) a face.
    pub min_tracking_confidence: f32,
    pub max_num_faces: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            max_num_faces: 1,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DetectorInitError> {
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectorInitError::InvalidConfig(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )));
            }
        }
        if self.max_num_faces == 0 {
            return Err(DetectorInitError::InvalidConfig(
                "max_num_faces must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Domain interface for face landmark detection.
///
/// Stateful: model sessions and tracked faces live inside the instance,
/// hence `&mut self`. One instance serves one pipeline; it is never shared
/// between threads while in use.
pub trait LandmarkDetector: Send {
    /// Loads model resources. Called once before any [`process`] call.
    ///
    /// [`process`]: LandmarkDetector::process
    fn initialize(&mut self, config: &DetectorConfig) -> Result<(), DetectorInitError>;

    /// Finds face landmarks in `frame`. An empty result is success.
    fn process(&mut self, frame: &Frame) -> Result<DetectionResult, Box<dyn std::error::Error>>;

    /// Drops model state. Safe to call more than once.
    fn release(&mut self);
}
