use crate::shared::error::FrameError;
use crate::shared::frame::{ColorSpace, Frame};

/// Turns raw capture frames into detector input and detector frames back
/// into the display sink's channel order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Preprocessor {
    mirror: bool,
    detector_color: ColorSpace,
    display_color: ColorSpace,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Preprocessor {
    /// RGB for the detector, BGR for display.
    pub fn new(mirror: bool) -> Self {
        Self {
            mirror,
            detector_color: ColorSpace::Rgb,
            display_color: ColorSpace::Bgr,
        }
    }

    /// Mirror (when enabled) and convert to the detector's channel order.
    pub fn prepare(&self, frame: Frame) -> Result<Frame, FrameError> {
        frame.validate()?;
        let frame = if self.mirror {
            mirror_horizontal(frame)
        } else {
            frame
        };
        Ok(convert_color(frame, self.detector_color))
    }

    /// Convert a detector frame to the display order. Never mirrors.
    pub fn restore(&self, frame: Frame) -> Result<Frame, FrameError> {
        frame.validate()?;
        Ok(convert_color(frame, self.display_color))
    }
}

/// Reverse every row in place.
pub fn mirror_horizontal(mut frame: Frame) -> Frame {
    let c = frame.channels() as usize;
    let row_len = frame.width() as usize * c;
    if row_len == 0 {
        return frame;
    }
    for row in frame.data_mut().chunks_exact_mut(row_len) {
        let w = row.len() / c;
        for x in 0..w / 2 {
            let (left, right) = row.split_at_mut((w - 1 - x) * c);
            left[x * c..x * c + c].swap_with_slice(&mut right[..c]);
        }
    }
    frame
}

/// Swap the first and third channel of every pixel when `target` differs
/// from the frame's current order. Alpha is untouched.
pub fn convert_color(mut frame: Frame, target: ColorSpace) -> Frame {
    if frame.color_space() == target {
        return frame;
    }
    let c = frame.channels() as usize;
    for px in frame.data_mut().chunks_exact_mut(c) {
        px.swap(0, 2);
    }
    frame.with_color_space(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn bgr_frame() -> Frame {
        // 3x2, each pixel distinct
        let data: Vec<u8> = (0..18).collect();
        Frame::try_new(data, 3, 2, 3, ColorSpace::Bgr, 4).unwrap()
    }

    #[test]
    fn test_mirror_reverses_rows() {
        let frame = mirror_horizontal(Frame::new((0..12).collect(), 2, 2, 3, 0));
        assert_eq!(frame.data(), &[3, 4, 5, 0, 1, 2, 9, 10, 11, 6, 7, 8]);
    }

    #[rstest]
    #[case::odd_width(3, 3)]
    #[case::even_width(4, 3)]
    #[case::rgba(5, 4)]
    #[case::single_column(1, 3)]
    fn test_double_mirror_is_identity(#[case] width: u32, #[case] channels: u8) {
        let len = width as usize * 3 * channels as usize;
        let data: Vec<u8> = (0..len).map(|i| (i * 7 % 251) as u8).collect();
        let original = Frame::new(data, width, 3, channels, 0);
        let twice = mirror_horizontal(mirror_horizontal(original.clone()));
        assert_eq!(twice, original);
    }

    #[test]
    fn test_convert_swaps_red_and_blue() {
        let frame = convert_color(bgr_frame(), ColorSpace::Rgb);
        assert_eq!(frame.color_space(), ColorSpace::Rgb);
        assert_eq!(&frame.data()[..6], &[2, 1, 0, 5, 4, 3]);
    }

    #[test]
    fn test_convert_keeps_alpha() {
        let frame = Frame::new(vec![1, 2, 3, 200], 1, 1, 4, 0);
        let frame = convert_color(frame, ColorSpace::Bgr);
        assert_eq!(frame.data(), &[3, 2, 1, 200]);
    }

    #[test]
    fn test_convert_to_same_space_is_noop() {
        let frame = convert_color(bgr_frame(), ColorSpace::Bgr);
        assert_eq!(frame, bgr_frame());
    }

    #[test]
    fn test_prepare_mirrors_and_converts() {
        let prepared = Preprocessor::new(true).prepare(bgr_frame()).unwrap();
        assert_eq!(prepared.color_space(), ColorSpace::Rgb);
        assert_eq!(prepared.index(), 4);
        // last BGR pixel of row 0 (6,7,8) becomes first RGB pixel (8,7,6)
        assert_eq!(&prepared.data()[..3], &[8, 7, 6]);
    }

    #[test]
    fn test_prepare_without_mirror() {
        let prepared = Preprocessor::new(false).prepare(bgr_frame()).unwrap();
        assert_eq!(&prepared.data()[..3], &[2, 1, 0]);
    }

    #[test]
    fn test_restore_does_not_mirror_again() {
        let pre = Preprocessor::new(true);
        let restored = pre.restore(pre.prepare(bgr_frame()).unwrap()).unwrap();
        assert_eq!(restored.color_space(), ColorSpace::Bgr);
        assert_eq!(restored, mirror_horizontal(bgr_frame()));
    }

    #[rstest]
    #[case::zero_width(Frame::new(Vec::new(), 0, 2, 3, 0))]
    #[case::zero_height(Frame::new(Vec::new(), 2, 0, 3, 0))]
    #[case::two_channels(Frame::new(vec![0; 8], 2, 2, 2, 0))]
    #[case::one_channel(Frame::new(vec![0; 4], 2, 2, 1, 0))]
    fn test_prepare_rejects_invalid_frames(#[case] frame: Frame) {
        let result = Preprocessor::default().prepare(frame);
        assert!(matches!(result, Err(FrameError::InvalidFrame(_))));
    }
}
