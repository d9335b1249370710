/// BlazeFace short-range face box stage using ONNX Runtime via `ort`.
///
/// Runs on the whole frame and yields normalized boxes. The session is
/// created on `load`, so constructing the detector never touches the disk.
use std::path::PathBuf;

use crate::detection::domain::face_stages::{FaceBox, FaceBoxDetector};
use crate::detection::domain::landmark_detector::DetectorInitError;
use crate::detection::infrastructure::math::{nms, sigmoid};
use crate::detection::infrastructure::onnx_session::{
    collect_outputs, input_geometry, open_session, sample_tensor, TensorLayout,
};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Values per anchor in the regressor output (box + 6 keypoints).
const REGRESSOR_STRIDE: usize = 16;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Candidates below this score never reach NMS.
const CANDIDATE_FLOOR: f32 = 0.01;

/// Pixel range the model was trained on.
const INPUT_RANGE: (f32, f32) = (-1.0, 1.0);

pub struct OnnxBlazeFaceDetector {
    model_path: PathBuf,
    session: Option<ort::session::Session>,
    layout: TensorLayout,
    input_size: u32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazeFaceDetector {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            session: None,
            layout: TensorLayout::Nchw,
            input_size: INPUT_SIZE,
            anchors: generate_anchors(INPUT_SIZE),
        }
    }
}

impl FaceBoxDetector for OnnxBlazeFaceDetector {
    fn load(&mut self) -> Result<(), DetectorInitError> {
        let session = open_session(&self.model_path)?;
        let (layout, size) = input_geometry(&session, INPUT_SIZE);
        log::debug!(
            "Face detector {} loaded ({:?}, {}x{})",
            self.model_path.display(),
            layout,
            size,
            size
        );
        self.layout = layout;
        self.input_size = size;
        self.anchors = generate_anchors(size);
        self.session = Some(session);
        Ok(())
    }

    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let session = self
            .session
            .as_mut()
            .ok_or("face detector model is not loaded")?;

        let input_tensor = sample_tensor(
            frame,
            &Region::new(0.0, 0.0, 1.0, 1.0),
            self.input_size,
            self.layout,
            INPUT_RANGE,
        );
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = session.run(ort::inputs![input_value])?;
        let buffers = collect_outputs(&outputs)?;
        drop(outputs);

        // Regressors are [1, N, 16], classificators [1, N, 1]; order varies
        // between exports, so pick them by size.
        let n = self.anchors.len();
        let regressors = buffers
            .iter()
            .find(|b| b.len() == n * REGRESSOR_STRIDE)
            .ok_or_else(|| format!("face detector produced no [1, {n}, 16] regressor output"))?;
        let scores = buffers
            .iter()
            .find(|b| b.len() == n)
            .ok_or_else(|| format!("face detector produced no [1, {n}, 1] score output"))?;

        let candidates = decode_boxes(regressors, scores, &self.anchors, self.input_size);
        Ok(nms(candidates, NMS_IOU_THRESH))
    }

    fn unload(&mut self) {
        self.session = None;
    }
}

/// Decode anchor-relative regressors into normalized boxes.
fn decode_boxes(
    regressors: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    input_size: u32,
) -> Vec<FaceBox> {
    let size = input_size as f32;
    let mut boxes = Vec::new();

    for (i, (&raw_score, anchor)) in scores.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw_score);
        if score < CANDIDATE_FLOOR {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        if offset + 4 > regressors.len() {
            break;
        }

        let cx = anchor[0] + regressors[offset] / size;
        let cy = anchor[1] + regressors[offset + 1] / size;
        let w = regressors[offset + 2] / size;
        let h = regressors[offset + 3] / size;
        if w <= 0.0 || h <= 0.0 {
            continue;
        }

        boxes.push(FaceBox {
            region: Region::new(cx - w / 2.0, cy - h / 2.0, w, h),
            score,
        });
    }

    boxes
}

/// Generate BlazeFace short-range anchors for a square input.
///
/// Two feature maps: stride 8 with 2 anchors per cell and stride 16 with
/// 6 anchors per cell (896 anchors at 128x128).
fn generate_anchors(input_size: u32) -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::new();

    for &(stride, num) in &strides {
        let grid_size = (input_size as usize / stride).max(1);
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_generate_anchors_count() {
        // 16x16 grid x 2 anchors + 8x8 grid x 6 anchors = 512 + 384 = 896
        assert_eq!(generate_anchors(128).len(), 896);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in &generate_anchors(128) {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_decode_box_relative_to_anchor() {
        let anchors = vec![[0.5, 0.5]];
        let mut regressors = vec![0.0; REGRESSOR_STRIDE];
        regressors[0] = 12.8; // +0.1 in x
        regressors[2] = 64.0; // width 0.5
        regressors[3] = 32.0; // height 0.25
        let boxes = decode_boxes(&regressors, &[5.0], &anchors, 128);

        assert_eq!(boxes.len(), 1);
        let r = boxes[0].region;
        assert_relative_eq!(r.x, 0.35, epsilon = 1e-5);
        assert_relative_eq!(r.y, 0.375, epsilon = 1e-5);
        assert_relative_eq!(r.width, 0.5, epsilon = 1e-5);
        assert_relative_eq!(r.height, 0.25, epsilon = 1e-5);
        assert!(boxes[0].score > 0.99);
    }

    #[test]
    fn test_decode_skips_hopeless_and_degenerate() {
        let anchors = vec![[0.5, 0.5], [0.25, 0.25]];
        let mut regressors = vec![0.0; 2 * REGRESSOR_STRIDE];
        regressors[2] = 10.0;
        regressors[3] = 10.0;
        // anchor 1 has a zero-sized box
        let boxes = decode_boxes(&regressors, &[-20.0, 3.0], &anchors, 128);
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_detect_before_load_is_error() {
        let mut detector = OnnxBlazeFaceDetector::new("/nonexistent/detector.onnx");
        let frame = Frame::new(vec![0; 12], 2, 2, 3, 0);
        assert!(detector.detect_faces(&frame).is_err());
    }

    #[test]
    fn test_load_missing_model() {
        let mut detector = OnnxBlazeFaceDetector::new("/nonexistent/detector.onnx");
        assert!(matches!(
            detector.load(),
            Err(DetectorInitError::MissingModel(_))
        ));
    }
}
