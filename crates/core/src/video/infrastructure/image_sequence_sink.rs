use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::preprocessing::preprocessor::convert_color;
use crate::shared::frame::{ColorSpace, Frame};
use crate::video::domain::display_sink::{DisplaySink, KeyCode};

/// Headless display: writes every shown frame to `<dir>/frame_<index>.png`
/// using the `image` crate. Never reports a key press.
pub struct ImageSequenceSink {
    dir: PathBuf,
    written: usize,
}

impl ImageSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.written
    }

    pub fn path_for(&self, frame_index: usize) -> PathBuf {
        self.dir.join(format!("frame_{frame_index:06}.png"))
    }
}

impl DisplaySink for ImageSequenceSink {
    fn show(&mut self, _window_name: &str, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::create_dir_all(&self.dir)?;
        write_png(&self.path_for(frame.index()), frame)?;
        self.written += 1;
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> Option<KeyCode> {
        None
    }

    fn close(&mut self) {
        if self.written > 0 {
            log::info!("Wrote {} frame(s) to {}", self.written, self.dir.display());
        }
    }
}

fn write_png(path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
    let (w, h) = (frame.width(), frame.height());
    let rgb = convert_color(frame.clone(), ColorSpace::Rgb);
    match rgb.channels() {
        3 => image::RgbImage::from_raw(w, h, rgb.into_data())
            .ok_or("Failed to create image from frame data")?
            .save(path)?,
        4 => image::RgbaImage::from_raw(w, h, rgb.into_data())
            .ok_or("Failed to create image from frame data")?
            .save(path)?,
        c => return Err(format!("cannot save a {c}-channel frame").into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(r: u8, g: u8, b: u8, index: usize) -> Frame {
        let data = [r, g, b].repeat(40 * 30);
        Frame::new(data, 40, 30, 3, index)
    }

    #[test]
    fn test_show_writes_numbered_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::new(dir.path().join("out"));
        sink.show("ignored", &solid(50, 100, 200, 3)).unwrap();

        let path = dir.path().join("out").join("frame_000003.png");
        assert_eq!(sink.path_for(3), path);
        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (40, 30));
        assert_eq!(img.get_pixel(0, 0).0, [50, 100, 200]);
        assert_eq!(sink.frames_written(), 1);
    }

    #[test]
    fn test_bgr_frames_are_saved_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::new(dir.path());
        let frame = solid(200, 100, 50, 0).with_color_space(ColorSpace::Bgr);
        sink.show("ignored", &frame).unwrap();

        let img = image::open(sink.path_for(0)).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(5, 5).0, [50, 100, 200]);
    }

    #[test]
    fn test_never_reports_keys() {
        let mut sink = ImageSequenceSink::new("unused");
        assert_eq!(sink.poll_key(Duration::from_millis(0)), None);
        assert!(!sink.close_requested());
    }

    #[test]
    fn test_unwritable_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let mut sink = ImageSequenceSink::new(blocker.join("sub"));
        assert!(sink.show("w", &solid(0, 0, 0, 0)).is_err());
    }
}
