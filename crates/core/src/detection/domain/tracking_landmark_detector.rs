use crate::detection::domain::face_stages::{FaceBoxDetector, LandmarkRegressor};
use crate::detection::domain::landmark::{DetectionResult, LandmarkSet};
use crate::detection::domain::landmark_detector::{
    DetectorConfig, DetectorInitError, LandmarkDetector,
};
use crate::shared::constants::{ROI_SCALE, SAME_FACE_IOU};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Two-stage landmark detector with frame-to-frame tracking.
///
/// Faces found in frame N seed the crop regions for frame N+1, so the face
/// box stage only runs while fewer than `max_num_faces` faces are tracked.
/// A tracked face whose landmark presence score drops below
/// `min_tracking_confidence` is forgotten and re-detected on the next frame.
pub struct TrackingLandmarkDetector<D, R> {
    face_detector: D,
    regressor: R,
    config: Option<DetectorConfig>,
    tracked: Vec<Region>,
}

impl<D: FaceBoxDetector, R: LandmarkRegressor> TrackingLandmarkDetector<D, R> {
    pub fn new(face_detector: D, regressor: R) -> Self {
        Self {
            face_detector,
            regressor,
            config: None,
            tracked: Vec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    /// Regions that will seed the next frame.
    pub fn tracked_regions(&self) -> &[Region] {
        &self.tracked
    }

    /// New face regions from the face box stage, skipping faces already
    /// covered by a tracked region.
    fn detect_new_faces(
        &mut self,
        frame: &Frame,
        config: &DetectorConfig,
        aspect: f32,
        existing: &[Region],
    ) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        let mut boxes = self.face_detector.detect_faces(frame)?;
        boxes.retain(|b| b.score >= config.min_detection_confidence);
        boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut fresh: Vec<Region> = Vec::new();
        for face in boxes {
            if existing.len() + fresh.len() >= config.max_num_faces {
                break;
            }
            let roi = face.region.square_around(ROI_SCALE, aspect);
            let known = existing
                .iter()
                .chain(fresh.iter())
                .any(|r| r.iou(&roi) > SAME_FACE_IOU);
            if !known {
                fresh.push(roi);
            }
        }
        Ok(fresh)
    }
}

impl<D: FaceBoxDetector, R: LandmarkRegressor> LandmarkDetector
    for TrackingLandmarkDetector<D, R>
{
    fn initialize(&mut self, config: &DetectorConfig) -> Result<(), DetectorInitError> {
        if self.config.is_some() {
            return Err(DetectorInitError::AlreadyInitialized);
        }
        config.validate()?;

        self.face_detector.load()?;
        if let Err(e) = self.regressor.load() {
            self.face_detector.unload();
            return Err(e);
        }

        self.config = Some(config.clone());
        self.tracked.clear();
        Ok(())
    }

    fn process(&mut self, frame: &Frame) -> Result<DetectionResult, Box<dyn std::error::Error>> {
        let config = self
            .config
            .clone()
            .ok_or("landmark detector used before initialize")?;
        frame.validate()?;
        let aspect = frame.width() as f32 / frame.height() as f32;

        // Taken up front: if anything below fails, the next frame starts
        // from a clean re-detection.
        let mut candidates = std::mem::take(&mut self.tracked);
        if candidates.len() < config.max_num_faces {
            let fresh = self.detect_new_faces(frame, &config, aspect, &candidates)?;
            candidates.extend(fresh);
        }

        let mut accepted: Vec<(LandmarkSet, Region)> = Vec::with_capacity(candidates.len());
        for roi in &candidates {
            let set = self.regressor.regress(frame, roi)?;
            if set.score() < config.min_tracking_confidence {
                log::debug!(
                    "Frame {}: dropping face with presence {:.2}",
                    frame.index(),
                    set.score()
                );
                continue;
            }
            let Some(bounds) = Region::bounding(set.landmarks().iter().map(|l| (l.x, l.y)))
            else {
                continue;
            };
            accepted.push((set, bounds.square_around(ROI_SCALE, aspect)));
        }

        accepted.sort_by(|a, b| b.0.score().total_cmp(&a.0.score()));
        let rois: Vec<Region> = accepted.iter().map(|(_, roi)| *roi).collect();
        let mut keep = Region::deduplicate(&rois, SAME_FACE_IOU);
        keep.truncate(config.max_num_faces);

        let mut faces = Vec::with_capacity(keep.len());
        for (i, (set, roi)) in accepted.into_iter().enumerate() {
            if keep.contains(&i) {
                self.tracked.push(roi);
                faces.push(set);
            }
        }

        Ok(DetectionResult::new(frame.index(), faces))
    }

    fn release(&mut self) {
        if self.config.take().is_some() {
            self.face_detector.unload();
            self.regressor.unload();
        }
        self.tracked.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_stages::FaceBox;
    use crate::detection::domain::landmark::Landmark;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    #[derive(Default)]
    struct Calls {
        detect: usize,
        regress: usize,
        unload_boxes: usize,
        unload_landmarks: usize,
    }

    struct StubFaceBoxes {
        boxes: Vec<FaceBox>,
        fail_load: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl FaceBoxDetector for StubFaceBoxes {
        fn load(&mut self) -> Result<(), DetectorInitError> {
            if self.fail_load {
                return Err(DetectorInitError::MissingModel("boxes.onnx".into()));
            }
            Ok(())
        }

        fn detect_faces(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().detect += 1;
            Ok(self.boxes.clone())
        }

        fn unload(&mut self) {
            self.calls.lock().unwrap().unload_boxes += 1;
        }
    }

    /// Places four landmarks at the corners of the inner two thirds of the
    /// ROI (so the next ROI equals the current one) with a scripted score.
    struct StubRegressor {
        scores: Arc<Mutex<Vec<f32>>>,
        default_score: f32,
        fail_load: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl LandmarkRegressor for StubRegressor {
        fn load(&mut self) -> Result<(), DetectorInitError> {
            if self.fail_load {
                return Err(DetectorInitError::ModelLoad {
                    path: "landmarks.onnx".into(),
                    message: "corrupt".into(),
                });
            }
            Ok(())
        }

        fn regress(
            &mut self,
            _frame: &Frame,
            roi: &Region,
        ) -> Result<LandmarkSet, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().regress += 1;
            let score = {
                let mut scores = self.scores.lock().unwrap();
                if scores.is_empty() {
                    self.default_score
                } else {
                    scores.remove(0)
                }
            };
            let inset_w = roi.width / 6.0;
            let inset_h = roi.height / 6.0;
            let (x0, y0) = (roi.x + inset_w, roi.y + inset_h);
            let (x1, y1) = (roi.x + roi.width - inset_w, roi.y + roi.height - inset_h);
            Ok(LandmarkSet::new(
                vec![
                    Landmark::new(x0, y0, 0.0),
                    Landmark::new(x1, y0, 0.0),
                    Landmark::new(x1, y1, 0.0),
                    Landmark::new(x0, y1, 0.0),
                ],
                score,
            ))
        }

        fn unload(&mut self) {
            self.calls.lock().unwrap().unload_landmarks += 1;
        }
    }

    // --- Helpers ---

    fn face(x: f32, y: f32, score: f32) -> FaceBox {
        FaceBox {
            region: Region::new(x, y, 0.2, 0.2),
            score,
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, index)
    }

    fn detector(
        boxes: Vec<FaceBox>,
        landmark_score: f32,
    ) -> (
        TrackingLandmarkDetector<StubFaceBoxes, StubRegressor>,
        Arc<Mutex<Calls>>,
        Arc<Mutex<Vec<f32>>>,
    ) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let scores = Arc::new(Mutex::new(Vec::new()));
        let det = TrackingLandmarkDetector::new(
            StubFaceBoxes {
                boxes,
                fail_load: false,
                calls: calls.clone(),
            },
            StubRegressor {
                scores: scores.clone(),
                default_score: landmark_score,
                fail_load: false,
                calls: calls.clone(),
            },
        );
        (det, calls, scores)
    }

    fn config(min_detection: f32, max_faces: usize) -> DetectorConfig {
        DetectorConfig {
            min_detection_confidence: min_detection,
            min_tracking_confidence: 0.5,
            max_num_faces: max_faces,
        }
    }

    // --- Lifecycle ---

    #[test]
    fn test_process_before_initialize_fails() {
        let (mut det, _, _) = detector(vec![face(0.4, 0.4, 0.9)], 0.9);
        assert!(det.process(&frame(0)).is_err());
    }

    #[test]
    fn test_initialize_twice_fails() {
        let (mut det, _, _) = detector(vec![], 0.9);
        det.initialize(&config(0.5, 1)).unwrap();
        assert!(matches!(
            det.initialize(&config(0.5, 1)),
            Err(DetectorInitError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_initialize_rejects_invalid_config() {
        let (mut det, _, _) = detector(vec![], 0.9);
        let result = det.initialize(&config(1.5, 1));
        assert!(matches!(result, Err(DetectorInitError::InvalidConfig(_))));
        assert!(!det.is_initialized());
    }

    #[test]
    fn test_regressor_load_failure_unloads_face_stage() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut det = TrackingLandmarkDetector::new(
            StubFaceBoxes {
                boxes: vec![],
                fail_load: false,
                calls: calls.clone(),
            },
            StubRegressor {
                scores: Arc::new(Mutex::new(Vec::new())),
                default_score: 0.9,
                fail_load: true,
                calls: calls.clone(),
            },
        );

        assert!(matches!(
            det.initialize(&config(0.5, 1)),
            Err(DetectorInitError::ModelLoad { .. })
        ));
        assert!(!det.is_initialized());
        assert_eq!(calls.lock().unwrap().unload_boxes, 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut det, calls, _) = detector(vec![], 0.9);
        det.initialize(&config(0.5, 1)).unwrap();
        det.release();
        det.release();
        let calls = calls.lock().unwrap();
        assert_eq!(calls.unload_boxes, 1);
        assert_eq!(calls.unload_landmarks, 1);
        assert!(!det.is_initialized());
    }

    // --- Detection ---

    #[rstest]
    #[case::one_channel(Frame::new(vec![0u8; 16], 4, 4, 1, 0))]
    #[case::two_channels(Frame::new(vec![0u8; 32], 4, 4, 2, 0))]
    #[case::empty(Frame::new(Vec::new(), 0, 4, 3, 0))]
    fn test_malformed_frame_is_error_without_touching_stages(#[case] bad: Frame) {
        let (mut det, calls, _) = detector(vec![face(0.4, 0.4, 0.9)], 0.9);
        det.initialize(&config(0.5, 1)).unwrap();

        assert!(det.process(&bad).is_err());
        assert_eq!(calls.lock().unwrap().detect, 0);
        assert_eq!(calls.lock().unwrap().regress, 0);
        assert!(!det.process(&frame(1)).unwrap().is_empty());
    }

    #[test]
    fn test_no_faces_is_empty_success() {
        let (mut det, _, _) = detector(vec![], 0.9);
        det.initialize(&config(0.5, 1)).unwrap();
        let result = det.process(&frame(3)).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.frame_index(), 3);
    }

    #[test]
    fn test_face_below_detection_threshold_excluded() {
        let (mut det, _, _) = detector(vec![face(0.4, 0.4, 0.3)], 0.9);
        det.initialize(&config(0.5, 1)).unwrap();
        assert!(det.process(&frame(0)).unwrap().is_empty());
    }

    #[test]
    fn test_raising_detection_threshold_never_adds_faces() {
        let boxes = vec![
            face(0.0, 0.0, 0.95),
            face(0.4, 0.0, 0.7),
            face(0.0, 0.5, 0.45),
            face(0.6, 0.6, 0.2),
        ];
        let mut previous = usize::MAX;
        for step in 0..=10 {
            let threshold = step as f32 / 10.0;
            let (mut det, _, _) = detector(boxes.clone(), 0.9);
            det.initialize(&config(threshold, 4)).unwrap();
            let count = det.process(&frame(0)).unwrap().len();
            assert!(count <= previous, "threshold {threshold} gave {count} > {previous}");
            previous = count;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_duplicate_boxes_yield_one_face() {
        let (mut det, _, _) = detector(vec![face(0.4, 0.4, 0.9), face(0.41, 0.4, 0.8)], 0.9);
        det.initialize(&config(0.5, 3)).unwrap();
        assert_eq!(det.process(&frame(0)).unwrap().len(), 1);
    }

    #[test]
    fn test_max_num_faces_caps_result() {
        let boxes = vec![face(0.0, 0.0, 0.9), face(0.5, 0.0, 0.8), face(0.0, 0.5, 0.7)];
        let (mut det, _, _) = detector(boxes, 0.9);
        det.initialize(&config(0.5, 2)).unwrap();
        assert_eq!(det.process(&frame(0)).unwrap().len(), 2);
    }

    // --- Tracking ---

    #[test]
    fn test_tracked_face_skips_face_stage() {
        let (mut det, calls, _) = detector(vec![face(0.4, 0.4, 0.9)], 0.9);
        det.initialize(&config(0.5, 1)).unwrap();

        assert_eq!(det.process(&frame(0)).unwrap().len(), 1);
        assert_eq!(det.process(&frame(1)).unwrap().len(), 1);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.detect, 1);
        assert_eq!(calls.regress, 2);
    }

    #[test]
    fn test_stale_track_triggers_redetection() {
        let (mut det, calls, scores) = detector(vec![face(0.4, 0.4, 0.9)], 0.9);
        det.initialize(&config(0.5, 1)).unwrap();

        // frame 0 detected, frame 1 tracking collapses, frame 2 re-detects
        *scores.lock().unwrap() = vec![0.9, 0.1];
        assert_eq!(det.process(&frame(0)).unwrap().len(), 1);
        assert!(det.process(&frame(1)).unwrap().is_empty());
        assert!(det.tracked_regions().is_empty());
        assert_eq!(det.process(&frame(2)).unwrap().len(), 1);

        assert_eq!(calls.lock().unwrap().detect, 2);
    }

    #[test]
    fn test_tracked_roi_is_stable_for_static_face() {
        let (mut det, _, _) = detector(vec![face(0.4, 0.4, 0.9)], 0.9);
        det.initialize(&config(0.5, 1)).unwrap();
        det.process(&frame(0)).unwrap();
        let first = det.tracked_regions()[0];
        det.process(&frame(1)).unwrap();
        let second = det.tracked_regions()[0];
        assert!(first.iou(&second) > 0.99);
    }

    #[test]
    fn test_release_forgets_tracking() {
        let (mut det, _, _) = detector(vec![face(0.4, 0.4, 0.9)], 0.9);
        det.initialize(&config(0.5, 1)).unwrap();
        det.process(&frame(0)).unwrap();
        det.release();
        assert!(det.tracked_regions().is_empty());
    }
}
