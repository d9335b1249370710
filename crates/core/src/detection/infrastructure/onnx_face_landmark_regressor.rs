/// Face mesh landmark stage using ONNX Runtime via `ort`.
///
/// Crops a square region of interest, regresses 468 points in crop pixel
/// space and maps them back to normalized frame coordinates.
use std::path::PathBuf;

use crate::detection::domain::face_stages::LandmarkRegressor;
use crate::detection::domain::landmark::{Landmark, LandmarkSet};
use crate::detection::domain::landmark_detector::DetectorInitError;
use crate::detection::infrastructure::math::sigmoid;
use crate::detection::infrastructure::onnx_session::{
    collect_outputs, input_geometry, open_session, sample_tensor, TensorLayout,
};
use crate::shared::constants::FACE_MESH_LANDMARK_COUNT;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Face mesh model input resolution.
const INPUT_SIZE: u32 = 192;

const INPUT_RANGE: (f32, f32) = (0.0, 1.0);

pub struct OnnxFaceLandmarkRegressor {
    model_path: PathBuf,
    session: Option<ort::session::Session>,
    layout: TensorLayout,
    input_size: u32,
}

impl OnnxFaceLandmarkRegressor {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            session: None,
            layout: TensorLayout::Nchw,
            input_size: INPUT_SIZE,
        }
    }
}

impl LandmarkRegressor for OnnxFaceLandmarkRegressor {
    fn load(&mut self) -> Result<(), DetectorInitError> {
        let session = open_session(&self.model_path)?;
        let (layout, size) = input_geometry(&session, INPUT_SIZE);
        log::debug!(
            "Landmark model {} loaded ({:?}, {}x{})",
            self.model_path.display(),
            layout,
            size,
            size
        );
        self.layout = layout;
        self.input_size = size;
        self.session = Some(session);
        Ok(())
    }

    fn regress(
        &mut self,
        frame: &Frame,
        roi: &Region,
    ) -> Result<LandmarkSet, Box<dyn std::error::Error>> {
        let session = self
            .session
            .as_mut()
            .ok_or("landmark model is not loaded")?;

        let input_tensor = sample_tensor(frame, roi, self.input_size, self.layout, INPUT_RANGE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = session.run(ort::inputs![input_value])?;
        let buffers = collect_outputs(&outputs)?;
        drop(outputs);

        decode_landmarks(&buffers, roi, self.input_size)
    }

    fn unload(&mut self) {
        self.session = None;
    }
}

/// Picks the landmark tensor (at least 468 x 3 values) and the single-value
/// presence logit out of the model outputs.
fn decode_landmarks(
    buffers: &[Vec<f32>],
    roi: &Region,
    input_size: u32,
) -> Result<LandmarkSet, Box<dyn std::error::Error>> {
    let coords = buffers
        .iter()
        .find(|b| b.len() >= FACE_MESH_LANDMARK_COUNT * 3)
        .ok_or("landmark model produced no 468x3 landmark output")?;
    let presence = buffers
        .iter()
        .find(|b| b.len() == 1)
        .ok_or("landmark model produced no face presence output")?;

    let size = input_size as f32;
    let landmarks = coords
        .chunks_exact(3)
        .take(FACE_MESH_LANDMARK_COUNT)
        .map(|p| {
            Landmark::new(
                roi.x + p[0] / size * roi.width,
                roi.y + p[1] / size * roi.height,
                p[2] / size * roi.width,
            )
        })
        .collect();

    Ok(LandmarkSet::new(landmarks, sigmoid(presence[0])))
}
