use crate::detection::infrastructure::pattern_face_detector::paint_pattern;
use crate::shared::frame::{ColorSpace, Frame};
use crate::video::domain::frame_source::{DeviceId, FrameRead, FrameSource, SourceInfo};

const DEFAULT_BACKGROUND: u8 = 20;
const DEFAULT_FACE: u8 = 220;
const NOMINAL_FPS: f64 = 30.0;

/// Generates BGR frames showing the synthetic face pattern drifting side to
/// side. Needs no hardware, so it backs offline demos and tests.
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    frame_count: Option<usize>,
    background_level: u8,
    face_level: u8,
    next_index: Option<usize>,
}

impl SyntheticFrameSource {
    /// `frame_count` of `None` streams forever.
    pub fn new(width: u32, height: u32, frame_count: Option<usize>) -> Self {
        Self {
            width,
            height,
            frame_count,
            background_level: DEFAULT_BACKGROUND,
            face_level: DEFAULT_FACE,
            next_index: None,
        }
    }

    pub fn with_levels(mut self, background_level: u8, face_level: u8) -> Self {
        self.background_level = background_level;
        self.face_level = face_level;
        self
    }

    fn render(&self, index: usize) -> Frame {
        let (w, h) = (self.width as f32, self.height as f32);
        let drift = (index as f32 * 0.1).sin() * w * 0.15;
        let mut frame = Frame::new(
            vec![0u8; self.width as usize * self.height as usize * 3],
            self.width,
            self.height,
            3,
            index,
        )
        .with_color_space(ColorSpace::Bgr);
        paint_pattern(
            &mut frame,
            (w / 2.0 + drift, h / 2.0),
            (w * 0.16, h * 0.25),
            self.background_level,
            self.face_level,
        );
        frame
    }
}

impl FrameSource for SyntheticFrameSource {
    fn open(&mut self, device: &DeviceId) -> Result<SourceInfo, Box<dyn std::error::Error>> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "synthetic source needs a non-zero size, got {}x{}",
                self.width, self.height
            )
            .into());
        }
        self.next_index = Some(0);
        Ok(SourceInfo {
            width: self.width,
            height: self.height,
            fps: NOMINAL_FPS,
            description: format!("synthetic pattern ({device})"),
        })
    }

    fn read_frame(&mut self) -> Result<FrameRead, Box<dyn std::error::Error>> {
        let index = self.next_index.ok_or("SyntheticFrameSource: not opened")?;
        if self.frame_count.is_some_and(|n| index >= n) {
            return Ok(FrameRead::EndOfStream);
        }
        self.next_index = Some(index + 1);
        Ok(FrameRead::Frame(self.render(index)))
    }

    fn close(&mut self) {
        self.next_index = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_source_ends() {
        let mut source = SyntheticFrameSource::new(64, 48, Some(3));
        let info = source.open(&DeviceId::default()).unwrap();
        assert_eq!((info.width, info.height), (64, 48));

        for i in 0..3 {
            match source.read_frame().unwrap() {
                FrameRead::Frame(frame) => {
                    assert_eq!(frame.index(), i);
                    assert_eq!(frame.color_space(), ColorSpace::Bgr);
                    assert!(frame.validate().is_ok());
                }
                FrameRead::EndOfStream => panic!("ended early at {i}"),
            }
        }
        assert!(matches!(source.read_frame().unwrap(), FrameRead::EndOfStream));
        assert!(matches!(source.read_frame().unwrap(), FrameRead::EndOfStream));
    }

    #[test]
    fn test_frames_contain_the_pattern() {
        let mut source = SyntheticFrameSource::new(64, 48, None).with_levels(10, 240);
        source.open(&DeviceId::default()).unwrap();
        let FrameRead::Frame(frame) = source.read_frame().unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(frame.rgb_at(32, 24), [240, 240, 240]);
        assert_eq!(frame.rgb_at(0, 0), [10, 10, 10]);
    }

    #[test]
    fn test_read_before_open_fails() {
        let mut source = SyntheticFrameSource::new(64, 48, None);
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn test_open_rejects_zero_size() {
        let mut source = SyntheticFrameSource::new(0, 48, None);
        assert!(source.open(&DeviceId::default()).is_err());
    }

    #[test]
    fn test_reopen_restarts_indices() {
        let mut source = SyntheticFrameSource::new(16, 16, None);
        source.open(&DeviceId::default()).unwrap();
        source.read_frame().unwrap();
        source.close();
        source.open(&DeviceId::default()).unwrap();
        let FrameRead::Frame(frame) = source.read_frame().unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(frame.index(), 0);
    }
}
