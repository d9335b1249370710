//! Shared math for the ONNX detection stages.

use crate::detection::domain::face_stages::FaceBox;

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x.clamp(-100.0, 100.0)).exp())
}

/// Greedy non-maximum suppression: highest score first, dropping any box
/// whose IoU with a kept box exceeds `iou_thresh`.
pub fn nms(mut boxes: Vec<FaceBox>, iou_thresh: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        let suppressed = keep
            .iter()
            .any(|k| k.region.iou(&candidate.region) > iou_thresh);
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}
