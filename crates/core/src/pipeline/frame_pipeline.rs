use std::time::{Duration, Instant};

use crate::detection::domain::landmark::DetectionResult;
use crate::detection::domain::landmark_detector::{DetectorConfig, LandmarkDetector};
use crate::pipeline::pipeline_error::StartupError;
use crate::pipeline::pipeline_logger::{
    NullPipelineLogger, PipelineLogger, METRIC_FACES, STAGE_CAPTURE, STAGE_DETECT, STAGE_DISPLAY,
    STAGE_PREPROCESS, STAGE_RENDER,
};
use crate::pipeline::pipeline_state::{PipelineState, StopReason};
use crate::pipeline::shutdown::ShutdownHandle;
use crate::preprocessing::preprocessor::Preprocessor;
use crate::rendering::domain::draw_style::DrawStyle;
use crate::rendering::domain::overlay_renderer::OverlayRenderer;
use crate::shared::constants::{
    DEFAULT_MAX_CONSECUTIVE_READ_ERRORS, DEFAULT_POLL_TIMEOUT_MS, DEFAULT_QUIT_KEY,
    DEFAULT_WINDOW_NAME,
};
use crate::shared::frame::Frame;
use crate::video::domain::display_sink::DisplaySink;
use crate::video::domain::frame_source::{DeviceId, FrameRead, FrameSource};

/// Loop-level options: where to show frames and when to stop.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub window_name: String,
    /// Compared against the low byte of each polled key.
    pub quit_keys: Vec<i32>,
    pub poll_timeout: Duration,
    /// Consecutive read errors after which the source counts as gone.
    pub max_consecutive_read_errors: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_name: DEFAULT_WINDOW_NAME.to_string(),
            quit_keys: vec![DEFAULT_QUIT_KEY],
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            max_consecutive_read_errors: DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
        }
    }
}

/// Counters for one run of the loop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub frames_read: usize,
    pub frames_shown: usize,
    /// Invalid frames dropped before detection.
    pub frames_skipped: usize,
    pub read_failures: usize,
    pub detector_failures: usize,
    pub render_failures: usize,
    pub display_failures: usize,
    pub stop_reason: Option<StopReason>,
}

/// The capture → preprocess → detect → render → display loop.
///
/// Owns every stage and the detector's lifecycle. One thread drives it;
/// each iteration runs to completion before the next frame is read.
pub struct FramePipeline {
    source: Box<dyn FrameSource>,
    device: DeviceId,
    preprocessor: Preprocessor,
    detector: Box<dyn LandmarkDetector>,
    detector_config: DetectorConfig,
    renderer: Box<dyn OverlayRenderer>,
    style: DrawStyle,
    sink: Box<dyn DisplaySink>,
    config: PipelineConfig,
    logger: Box<dyn PipelineLogger>,
    shutdown: ShutdownHandle,
    state: PipelineState,
    summary: RunSummary,
    consecutive_read_errors: usize,
}

impl FramePipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        device: DeviceId,
        detector: Box<dyn LandmarkDetector>,
        renderer: Box<dyn OverlayRenderer>,
        sink: Box<dyn DisplaySink>,
    ) -> Self {
        Self {
            source,
            device,
            preprocessor: Preprocessor::default(),
            detector,
            detector_config: DetectorConfig::default(),
            renderer,
            style: DrawStyle::default(),
            sink,
            config: PipelineConfig::default(),
            logger: Box::new(NullPipelineLogger),
            shutdown: ShutdownHandle::new(),
            state: PipelineState::Uninitialized,
            summary: RunSummary::default(),
            consecutive_read_errors: 0,
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_detector_config(mut self, config: DetectorConfig) -> Self {
        self.detector_config = config;
        self
    }

    pub fn with_style(mut self, style: DrawStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_shutdown_handle(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = handle;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// A handle other threads can use to stop the loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Initializes the detector, then opens the source.
    ///
    /// On failure the pipeline stays `Uninitialized` with nothing held: the
    /// source is never opened when the detector fails, and the detector is
    /// released again when the source fails.
    pub fn start(&mut self) -> Result<(), StartupError> {
        match self.state {
            PipelineState::Closed => return Err(StartupError::AlreadyClosed),
            PipelineState::Running | PipelineState::Draining => {
                return Err(StartupError::AlreadyStarted)
            }
            PipelineState::Uninitialized => {}
        }

        self.detector.initialize(&self.detector_config)?;

        let info = match self.source.open(&self.device) {
            Ok(info) => info,
            Err(e) => {
                self.detector.release();
                return Err(StartupError::Source(e.to_string()));
            }
        };

        self.logger.info(&format!(
            "Streaming {} ({}x{})",
            info.description, info.width, info.height
        ));
        self.summary = RunSummary::default();
        self.consecutive_read_errors = 0;
        self.state = PipelineState::Running;
        Ok(())
    }

    /// Runs one loop iteration when `Running` and returns the state after it.
    pub fn step(&mut self) -> PipelineState {
        if self.state != PipelineState::Running {
            return self.state;
        }

        if self.shutdown.is_requested() {
            self.drain(StopReason::ShutdownRequested);
            return self.state;
        }

        let t0 = Instant::now();
        let read = self.source.read_frame();
        self.logger.timing(STAGE_CAPTURE, elapsed_ms(t0));

        match read {
            Ok(FrameRead::Frame(frame)) => {
                self.consecutive_read_errors = 0;
                self.summary.frames_read += 1;
                if let Some(display) = self.process_frame(frame) {
                    self.present(&display);
                }
                self.logger.progress(self.summary.frames_read);
            }
            Ok(FrameRead::EndOfStream) => {
                self.drain(StopReason::EndOfStream);
                return self.state;
            }
            Err(e) => {
                self.summary.read_failures += 1;
                self.consecutive_read_errors += 1;
                log::warn!(
                    "Frame read failed ({}/{}): {e}",
                    self.consecutive_read_errors,
                    self.config.max_consecutive_read_errors
                );
                if self.consecutive_read_errors >= self.config.max_consecutive_read_errors {
                    self.drain(StopReason::SourceDisconnected);
                    return self.state;
                }
            }
        }

        self.poll_termination();
        self.state
    }

    /// `start` if needed, iterate until the loop stops, then `shutdown`.
    pub fn run(&mut self) -> Result<RunSummary, StartupError> {
        if self.state == PipelineState::Uninitialized {
            self.start()?;
        } else if self.state == PipelineState::Closed {
            return Err(StartupError::AlreadyClosed);
        }

        while self.step() == PipelineState::Running {}

        self.shutdown();
        self.logger.summary();
        Ok(self.summary.clone())
    }

    /// Releases the detector, closes the source and the sink. Idempotent;
    /// from `Uninitialized` there is nothing to release.
    pub fn shutdown(&mut self) {
        if self.state == PipelineState::Closed {
            return;
        }
        if self.state.holds_resources() {
            if self.summary.stop_reason.is_none() {
                self.summary.stop_reason = Some(StopReason::ShutdownRequested);
            }
            self.detector.release();
            self.source.close();
            self.sink.close();
            self.logger.info(&format!(
                "Pipeline closed after {} frames",
                self.summary.frames_read
            ));
        }
        self.state = PipelineState::Closed;
    }

    fn drain(&mut self, reason: StopReason) {
        log::debug!("Draining: {reason}");
        self.summary.stop_reason = Some(reason);
        self.state = PipelineState::Draining;
    }

    /// Preprocess, detect, restore and render one frame. Returns the frame
    /// to show, or `None` when the frame is unusable.
    fn process_frame(&mut self, raw: Frame) -> Option<Frame> {
        let index = raw.index();

        let t0 = Instant::now();
        let prepared = match self.preprocessor.prepare(raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.summary.frames_skipped += 1;
                log::warn!("Skipping frame {index}: {e}");
                return None;
            }
        };
        self.logger.timing(STAGE_PREPROCESS, elapsed_ms(t0));

        let t0 = Instant::now();
        let result = match self.detector.process(&prepared) {
            Ok(result) => result,
            Err(e) => {
                self.summary.detector_failures += 1;
                log::warn!("Detection failed on frame {index}: {e}");
                DetectionResult::empty(index)
            }
        };
        self.logger.timing(STAGE_DETECT, elapsed_ms(t0));
        self.logger.metric(METRIC_FACES, result.len() as f64);

        let display = match self.preprocessor.restore(prepared) {
            Ok(frame) => frame,
            Err(e) => {
                self.summary.frames_skipped += 1;
                log::warn!("Skipping frame {index}: {e}");
                return None;
            }
        };

        if result.is_empty() {
            return Some(display);
        }

        let t0 = Instant::now();
        let unannotated = display.clone();
        let shown = match self.renderer.draw(display, &result, &self.style) {
            Ok(frame) => frame,
            Err(e) => {
                self.summary.render_failures += 1;
                log::warn!("Overlay failed on frame {index}: {e}");
                unannotated
            }
        };
        self.logger.timing(STAGE_RENDER, elapsed_ms(t0));
        Some(shown)
    }

    fn present(&mut self, frame: &Frame) {
        let t0 = Instant::now();
        match self.sink.show(&self.config.window_name, frame) {
            Ok(()) => self.summary.frames_shown += 1,
            Err(e) => {
                self.summary.display_failures += 1;
                log::warn!("Display failed on frame {}: {e}", frame.index());
            }
        }
        self.logger.timing(STAGE_DISPLAY, elapsed_ms(t0));
    }

    fn poll_termination(&mut self) {
        if let Some(key) = self.sink.poll_key(self.config.poll_timeout) {
            if key.is_any_of(&self.config.quit_keys) {
                self.drain(StopReason::QuitKey(key));
                return;
            }
        }
        if self.sink.close_requested() {
            self.drain(StopReason::WindowClosed);
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn elapsed_ms(t0: Instant) -> f64 {
    t0.elapsed().as_secs_f64() * 1000.0
}
