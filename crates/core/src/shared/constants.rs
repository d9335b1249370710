/// Short-range face box model (128x128 input, 896 anchors).
pub const FACE_DETECTOR_MODEL_NAME: &str = "face_detection_short_range.onnx";

/// Face landmark model (192x192 input, 468 landmarks).
pub const FACE_LANDMARK_MODEL_NAME: &str = "face_landmark.onnx";

/// Number of landmarks in a face mesh.
pub const FACE_MESH_LANDMARK_COUNT: usize = 468;

pub const DEFAULT_WINDOW_NAME: &str = "MediaPipe FaceMesh";

/// ESC. Compared against the low byte of the polled key code.
pub const DEFAULT_QUIT_KEY: i32 = 27;

pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 5;

/// Read errors in a row before the source is treated as disconnected
/// (~1 second at 30 fps).
pub const DEFAULT_MAX_CONSECUTIVE_READ_ERRORS: usize = 30;

/// Side of the square face crop relative to the face bounding box.
pub const ROI_SCALE: f32 = 1.5;

/// IoU above which two face regions are considered the same face.
pub const SAME_FACE_IOU: f32 = 0.5;
