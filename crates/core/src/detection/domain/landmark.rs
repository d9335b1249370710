/// One face landmark. `x` and `y` are normalized to the frame's width and
/// height; `z` is relative depth on the same scale as `x`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Projects into pixel coordinates of a `width` x `height` frame.
    pub fn to_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// Ordered landmarks for a single detected face.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
    /// Presence score that admitted this face, in `[0,1]`.
    score: f32,
}

impl LandmarkSet {
    pub fn new(landmarks: Vec<Landmark>, score: f32) -> Self {
        Self { landmarks, score }
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// All faces found in one frame, tagged with that frame's index.
///
/// Holds one entry per distinct face; never more.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DetectionResult {
    frame_index: usize,
    faces: Vec<LandmarkSet>,
}

impl DetectionResult {
    pub fn new(frame_index: usize, faces: Vec<LandmarkSet>) -> Self {
        Self { frame_index, faces }
    }

    pub fn empty(frame_index: usize) -> Self {
        Self::new(frame_index, Vec::new())
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn faces(&self) -> &[LandmarkSet] {
        &self.faces
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_to_pixel_scales_by_frame_size() {
        let (x, y) = Landmark::new(0.5, 0.25, 0.0).to_pixel(640, 480);
        assert_relative_eq!(x, 320.0);
        assert_relative_eq!(y, 120.0);
    }

    #[test]
    fn test_empty_result_has_no_faces() {
        let result = DetectionResult::empty(7);
        assert!(result.is_empty());
        assert_eq!(result.frame_index(), 7);
    }

    #[test]
    fn test_landmark_set_accessors() {
        let set = LandmarkSet::new(vec![Landmark::new(0.1, 0.2, 0.0); 3], 0.9);
        assert_eq!(set.len(), 3);
        assert_relative_eq!(set.score(), 0.9);
        assert!(!set.is_empty());
    }
}
