//! The two stages a tracking landmark detector is composed of: a face box
//! finder that runs only when new faces are needed, and a landmark
//! regressor that runs on every tracked face.

use crate::detection::domain::landmark::LandmarkSet;
use crate::detection::domain::landmark_detector::DetectorInitError;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// A candidate face: normalized bounding box plus detector score in `[0,1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub region: Region,
    pub score: f32,
}

pub trait FaceBoxDetector: Send {
    fn load(&mut self) -> Result<(), DetectorInitError>;

    /// All candidate faces, unfiltered by confidence.
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;

    fn unload(&mut self) {}
}

pub trait LandmarkRegressor: Send {
    fn load(&mut self) -> Result<(), DetectorInitError>;

    /// Landmarks for the face inside `roi` (normalized, may extend past the
    /// frame). The set's score is the face presence probability.
    fn regress(
        &mut self,
        frame: &Frame,
        roi: &Region,
    ) -> Result<LandmarkSet, Box<dyn std::error::Error>>;

    fn unload(&mut self) {}
}
