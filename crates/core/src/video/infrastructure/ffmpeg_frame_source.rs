use std::path::Path;

use crate::shared::frame::{ColorSpace, Frame};
use crate::video::domain::frame_source::{DeviceId, FrameRead, FrameSource, SourceInfo};

/// Decodes frames from video files and capture devices via ffmpeg-next.
///
/// Frames come out as packed BGR24, the order capture devices
/// conventionally deliver.
pub struct FfmpegFrameSource {
    state: Option<DecodeState>,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegFrameSource {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self, device: &DeviceId) -> Result<SourceInfo, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let path = device.to_path();
        let ictx = open_input(&path, device)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::BGR24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let info = SourceInfo {
            width,
            height,
            fps,
            description: format!(
                "{} ({})",
                path.display(),
                decoder
                    .codec()
                    .map(|c| c.name().to_string())
                    .unwrap_or_default()
            ),
        };
        log::info!(
            "Opened {device}: {}x{} @ {:.1} fps",
            info.width,
            info.height,
            info.fps
        );

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        });

        Ok(info)
    }

    fn read_frame(&mut self) -> Result<FrameRead, Box<dyn std::error::Error>> {
        let state = self
            .state
            .as_mut()
            .ok_or("FfmpegFrameSource: not opened")?;
        state.next_frame()
    }

    fn close(&mut self) {
        self.state = None;
    }
}

/// Capture device indices go through the platform grabber; everything else
/// is detected by libavformat.
fn open_input(
    path: &Path,
    device: &DeviceId,
) -> Result<ffmpeg_next::format::context::Input, ffmpeg_next::Error> {
    if matches!(device, DeviceId::Index(_)) {
        ffmpeg_next::device::register_all();
        let grabber = ffmpeg_next::device::input::video()
            .find(|f| f.name().split(',').any(|n| n == CAPTURE_FORMAT));
        if let Some(format) = grabber {
            return ffmpeg_next::format::open_with(
                path,
                &format,
                ffmpeg_next::Dictionary::new(),
            )
            .map(|ctx| ctx.input());
        }
    }
    ffmpeg_next::format::input(path)
}

#[cfg(target_os = "linux")]
const CAPTURE_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const CAPTURE_FORMAT: &str = "avfoundation";
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const CAPTURE_FORMAT: &str = "dshow";

impl DecodeState {
    fn try_receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut bgr_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut bgr_frame)?;

        let pixels = extract_packed_pixels(&bgr_frame, self.width, self.height);
        let frame = Frame::try_new(
            pixels,
            self.width,
            self.height,
            3,
            ColorSpace::Bgr,
            self.frame_index,
        )?;
        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn next_frame(&mut self) -> Result<FrameRead, Box<dyn std::error::Error>> {
        if self.done {
            return Ok(FrameRead::EndOfStream);
        }

        if let Some(frame) = self.try_receive()? {
            return Ok(FrameRead::Frame(frame));
        }

        if self.flushing {
            self.done = true;
            return Ok(FrameRead::EndOfStream);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(frame) = self.try_receive()? {
                    return Ok(FrameRead::Frame(frame));
                }
                self.done = true;
                return Ok(FrameRead::EndOfStream);
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(frame) = self.try_receive()? {
                return Ok(FrameRead::Frame(frame));
            }
        }
    }
}

/// Copies pixel data from an ffmpeg frame into a tightly packed buffer,
/// dropping the per-row stride padding.
fn extract_packed_pixels(
    frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_len]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Encodes `num_frames` solid frames whose blue channel steps by 40 per
    /// frame while red stays at 200.
    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        let drain = |encoder: &mut ffmpeg_next::encoder::Video,
                         octx: &mut ffmpeg_next::format::context::Output| {
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
                encoded.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let stride = rgb_frame.stride(0);
            let data = rgb_frame.data_mut(0);
            let blue = ((i * 40) % 256) as u8;
            for row in 0..height as usize {
                for col in 0..width as usize {
                    let offset = row * stride + col * 3;
                    data[offset] = 200;
                    data[offset + 1] = 100;
                    data[offset + 2] = blue;
                }
            }

            let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));
            encoder.send_frame(&yuv_frame).unwrap();
            drain(&mut encoder, &mut octx);
        }

        encoder.send_eof().unwrap();
        drain(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }

    fn test_video(dir: &Path, num_frames: usize) -> DeviceId {
        let path: PathBuf = dir.join("test.mp4");
        create_test_video(&path, num_frames, 160, 120, 30);
        DeviceId::Path(path.to_string_lossy().into_owned())
    }

    fn read_all(source: &mut FfmpegFrameSource) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let FrameRead::Frame(frame) = source.read_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_open_returns_info() {
        let dir = tempfile::tempdir().unwrap();
        let device = test_video(dir.path(), 5);

        let mut source = FfmpegFrameSource::new();
        let info = source.open(&device).unwrap();
        assert_eq!(info.width, 160);
        assert_eq!(info.height, 120);
        assert!(info.fps > 0.0);
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut source = FfmpegFrameSource::new();
        let device = DeviceId::Path("/nonexistent/test.mp4".into());
        assert!(source.open(&device).is_err());
    }

    #[test]
    fn test_reads_every_frame_then_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let device = test_video(dir.path(), 5);

        let mut source = FfmpegFrameSource::new();
        source.open(&device).unwrap();
        let frames = read_all(&mut source);

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
        }
        assert!(matches!(
            source.read_frame().unwrap(),
            FrameRead::EndOfStream
        ));
    }

    #[test]
    fn test_frames_are_packed_bgr() {
        let dir = tempfile::tempdir().unwrap();
        let device = test_video(dir.path(), 1);

        let mut source = FfmpegFrameSource::new();
        source.open(&device).unwrap();
        let frame = read_all(&mut source).remove(0);

        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.color_space(), ColorSpace::Bgr);
        assert_eq!(frame.data().len(), 160 * 120 * 3);
        // red was encoded at 200, blue at 0; allow for YUV rounding
        let [r, _, b] = frame.rgb_at(80, 60);
        assert!(r > 150, "red = {r}");
        assert!(b < 60, "blue = {b}");
    }

    #[test]
    fn test_read_without_open_fails() {
        let mut source = FfmpegFrameSource::new();
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let device = test_video(dir.path(), 1);

        let mut source = FfmpegFrameSource::new();
        source.open(&device).unwrap();
        source.close();
        source.close();
        assert!(source.read_frame().is_err());
    }
}
