//! ONNX Runtime plumbing shared by the face box and landmark stages.

use std::path::Path;

use crate::detection::domain::landmark_detector::DetectorInitError;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Memory layout of a model's image input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Opens a session for `path`, mapping every failure to a
/// [`DetectorInitError`].
pub fn open_session(path: &Path) -> Result<ort::session::Session, DetectorInitError> {
    if !path.is_file() {
        return Err(DetectorInitError::MissingModel(path.to_path_buf()));
    }
    build_session(path).map_err(|e| DetectorInitError::ModelLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn build_session(path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(path)?;
    Ok(session)
}

/// Reads the image input's layout and square side from the model.
///
/// Falls back to NCHW at `default_size` when the shape is dynamic or
/// unreadable.
pub fn input_geometry(session: &ort::session::Session, default_size: u32) -> (TensorLayout, u32) {
    session
        .inputs()
        .first()
        .and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() != 4 {
                    return None;
                }
                if shape[1] == 3 && shape[2] > 0 {
                    Some((TensorLayout::Nchw, shape[2] as u32))
                } else if shape[3] == 3 && shape[1] > 0 {
                    Some((TensorLayout::Nhwc, shape[1] as u32))
                } else {
                    None
                }
            } else {
                None
            }
        })
        .unwrap_or((TensorLayout::Nchw, default_size))
}

/// Nearest-neighbour resample of `roi` (normalized, may extend past the
/// frame; outside samples are zero) into a `size` x `size` RGB tensor with
/// values mapped from `[0,255]` to `range`.
pub fn sample_tensor(
    frame: &Frame,
    roi: &Region,
    size: u32,
    layout: TensorLayout,
    range: (f32, f32),
) -> ndarray::Array4<f32> {
    let s = size as usize;
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    let (lo, hi) = range;
    let scale = (hi - lo) / 255.0;

    let mut tensor = match layout {
        TensorLayout::Nchw => ndarray::Array4::<f32>::from_elem((1, 3, s, s), lo),
        TensorLayout::Nhwc => ndarray::Array4::<f32>::from_elem((1, s, s, 3), lo),
    };

    for ty in 0..s {
        let ny = roi.y + (ty as f32 + 0.5) / s as f32 * roi.height;
        let py = (ny * fh).floor();
        if py < 0.0 || py >= fh {
            continue;
        }
        for tx in 0..s {
            let nx = roi.x + (tx as f32 + 0.5) / s as f32 * roi.width;
            let px = (nx * fw).floor();
            if px < 0.0 || px >= fw {
                continue;
            }
            let rgb = frame.rgb_at(px as u32, py as u32);
            for (c, value) in rgb.iter().enumerate() {
                let v = lo + *value as f32 * scale;
                match layout {
                    TensorLayout::Nchw => tensor[[0, c, ty, tx]] = v,
                    TensorLayout::Nhwc => tensor[[0, ty, tx, c]] = v,
                }
            }
        }
    }

    tensor
}

/// Copies every output tensor of a run into owned buffers, in output order.
pub fn collect_outputs(
    outputs: &ort::session::SessionOutputs<'_>,
) -> Result<Vec<Vec<f32>>, Box<dyn std::error::Error>> {
    let mut collected = Vec::with_capacity(outputs.len());
    for i in 0..outputs.len() {
        let array = outputs[i].try_extract_array::<f32>()?;
        collected.push(array.iter().copied().collect());
    }
    Ok(collected)
}
