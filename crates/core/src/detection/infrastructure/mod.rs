pub mod math;
pub mod onnx_blazeface_detector;
pub mod onnx_face_landmark_regressor;
mod onnx_session;
pub mod pattern_face_detector;
