use std::time::{Duration, Instant};

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::shared::frame::Frame;
use crate::video::domain::display_sink::{DisplaySink, KeyCode};

/// Native window via minifb. The window is created on the first `show` and
/// recreated when the frame size changes.
pub struct MinifbDisplaySink {
    window: Option<Window>,
    size: (usize, usize),
    buffer: Vec<u32>,
}

impl MinifbDisplaySink {
    pub fn new() -> Self {
        Self {
            window: None,
            size: (0, 0),
            buffer: Vec::new(),
        }
    }

    fn ensure_window(
        &mut self,
        title: &str,
        width: usize,
        height: usize,
    ) -> Result<&mut Window, Box<dyn std::error::Error>> {
        if self.window.is_none() || self.size != (width, height) {
            let window = Window::new(title, width, height, WindowOptions::default())?;
            log::debug!("Opened window '{title}' ({width}x{height})");
            self.window = Some(window);
            self.size = (width, height);
        }
        self.window.as_mut().ok_or_else(|| "window unavailable".into())
    }
}

impl Default for MinifbDisplaySink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for MinifbDisplaySink {
    fn show(&mut self, window_name: &str, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let mut buffer = std::mem::take(&mut self.buffer);
        pack_pixels(frame, &mut buffer);
        let window = self.ensure_window(window_name, w, h)?;
        let result = window.update_with_buffer(&buffer, w, h);
        self.buffer = buffer;
        result?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Option<KeyCode> {
        let window = self.window.as_mut()?;
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(code) = window
                .get_keys_pressed(KeyRepeat::No)
                .into_iter()
                .find_map(key_code)
            {
                return Some(code);
            }
            if !window.is_open() || Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
            window.update();
        }
    }

    fn close_requested(&self) -> bool {
        self.window.as_ref().is_some_and(|w| !w.is_open())
    }

    fn close(&mut self) {
        self.window = None;
    }
}

/// Packs a 3- or 4-channel frame into minifb's `0RGB` words.
fn pack_pixels(frame: &Frame, out: &mut Vec<u32>) {
    let c = frame.channels() as usize;
    let r = frame.color_space().red_index();
    let b = 2 - r;
    out.clear();
    out.extend(frame.data().chunks_exact(c).map(|px| {
        ((px[r] as u32) << 16) | ((px[1] as u32) << 8) | px[b] as u32
    }));
}

/// ASCII-style code for the keys a viewer cares about.
fn key_code(key: Key) -> Option<KeyCode> {
    let code = match key {
        Key::Escape => 27,
        Key::Enter => 13,
        Key::Space => 32,
        Key::Tab => 9,
        Key::Backspace => 8,
        Key::Key0 => b'0' as i32,
        Key::Key1 => b'1' as i32,
        Key::Key2 => b'2' as i32,
        Key::Key3 => b'3' as i32,
        Key::Key4 => b'4' as i32,
        Key::Key5 => b'5' as i32,
        Key::Key6 => b'6' as i32,
        Key::Key7 => b'7' as i32,
        Key::Key8 => b'8' as i32,
        Key::Key9 => b'9' as i32,
        Key::A => b'a' as i32,
        Key::B => b'b' as i32,
        Key::C => b'c' as i32,
        Key::D => b'd' as i32,
        Key::E => b'e' as i32,
        Key::F => b'f' as i32,
        Key::G => b'g' as i32,
        Key::H => b'h' as i32,
        Key::I => b'i' as i32,
        Key::J => b'j' as i32,
        Key::K => b'k' as i32,
        Key::L => b'l' as i32,
        Key::M => b'm' as i32,
        Key::N => b'n' as i32,
        Key::O => b'o' as i32,
        Key::P => b'p' as i32,
        Key::Q => b'q' as i32,
        Key::R => b'r' as i32,
        Key::S => b's' as i32,
        Key::T => b't' as i32,
        Key::U => b'u' as i32,
        Key::V => b'v' as i32,
        Key::W => b'w' as i32,
        Key::X => b'x' as i32,
        Key::Y => b'y' as i32,
        Key::Z => b'z' as i32,
        _ => return None,
    };
    Some(KeyCode(code))
}
