use std::path::PathBuf;
use std::process;

use clap::Parser;

use facemesh_core::detection::domain::landmark_detector::LandmarkDetector;
use facemesh_core::detection::domain::tracking_landmark_detector::TrackingLandmarkDetector;
use facemesh_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazeFaceDetector;
use facemesh_core::detection::infrastructure::onnx_face_landmark_regressor::OnnxFaceLandmarkRegressor;
use facemesh_core::detection::infrastructure::pattern_face_detector::{
    PatternFaceDetector, PatternLandmarkRegressor,
};
use facemesh_core::pipeline::frame_pipeline::FramePipeline;
use facemesh_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facemesh_core::rendering::domain::draw_style::LineStyle;
use facemesh_core::rendering::infrastructure::cpu_overlay_renderer::CpuOverlayRenderer;
use facemesh_core::shared::constants::{FACE_DETECTOR_MODEL_NAME, FACE_LANDMARK_MODEL_NAME};
use facemesh_core::shared::model_resolver;
use facemesh_core::shared::settings::Settings;
use facemesh_core::video::domain::display_sink::DisplaySink;
use facemesh_core::video::domain::frame_source::{DeviceId, FrameSource};
use facemesh_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facemesh_core::video::infrastructure::image_sequence_sink::ImageSequenceSink;
use facemesh_core::video::infrastructure::minifb_display_sink::MinifbDisplaySink;
use facemesh_core::video::infrastructure::synthetic_frame_source::SyntheticFrameSource;
use facemesh_core::video::infrastructure::threaded_frame_source::{
    FrameDropPolicy, ThreadedFrameSource,
};

/// Live face mesh viewer for webcams and video files.
#[derive(Parser)]
#[command(name = "facemesh")]
struct Cli {
    /// Camera index (0 = /dev/video0) or a video file path / URL.
    #[arg(default_value = "0")]
    device: String,

    /// Settings file (defaults to the per-user settings.json when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    min_detection_confidence: Option<f32>,

    /// Landmark tracking confidence threshold (0.0-1.0).
    #[arg(long)]
    min_tracking_confidence: Option<f32>,

    /// Maximum number of faces to track.
    #[arg(long)]
    max_num_faces: Option<usize>,

    /// Mesh line thickness in pixels.
    #[arg(long)]
    thickness: Option<u32>,

    /// Landmark point radius in pixels.
    #[arg(long)]
    circle_radius: Option<u32>,

    /// Mesh line style: SOLID, DASHED or DOTTED.
    #[arg(long)]
    tesselation_style: Option<LineStyle>,

    /// Draw the mesh only, without landmark points.
    #[arg(long)]
    no_points: bool,

    /// Show the feed as captured instead of mirrored.
    #[arg(long)]
    no_mirror: bool,

    /// Directory holding the ONNX face models.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Write annotated frames as PNGs to this directory instead of opening a window.
    #[arg(long)]
    headless: Option<PathBuf>,

    /// Use a generated test pattern and the model-free detector.
    #[arg(long)]
    synthetic: bool,

    /// Stop the synthetic source after this many frames.
    #[arg(long, default_value = "300")]
    max_frames: usize,

    /// Capture on a background thread and drop frames the loop cannot keep up with.
    #[arg(long)]
    drop_frames: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    let detector = build_detector(&cli, &settings)?;
    let source = build_source(&cli);
    let sink = build_sink(&cli);
    let device = if cli.synthetic {
        DeviceId::Path("synthetic".into())
    } else {
        DeviceId::parse(&cli.device)
    };

    let mut pipeline = FramePipeline::new(
        source,
        device,
        detector,
        Box::new(CpuOverlayRenderer::new()),
        sink,
    )
    .with_preprocessor(settings.preprocessor())
    .with_detector_config(settings.detector_config())
    .with_style(settings.draw_style())
    .with_config(settings.pipeline_config())
    .with_logger(Box::new(StdoutPipelineLogger::default()));

    let summary = pipeline.run()?;
    if let Some(reason) = summary.stop_reason {
        log::info!(
            "Stopped ({reason}): {} frames read, {} shown",
            summary.frames_read,
            summary.frames_shown
        );
    }
    let failures = summary.detector_failures
        + summary.render_failures
        + summary.display_failures
        + summary.read_failures;
    if failures > 0 || summary.frames_skipped > 0 {
        log::warn!(
            "{} frames skipped, {} detector, {} render, {} display and {} read failures",
            summary.frames_skipped,
            summary.detector_failures,
            summary.render_failures,
            summary.display_failures,
            summary.read_failures
        );
    }
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::load_or_default(cli.config.as_deref())?;

    if let Some(v) = cli.min_detection_confidence {
        settings.min_detection_confidence = v;
    }
    if let Some(v) = cli.min_tracking_confidence {
        settings.min_tracking_confidence = v;
    }
    if let Some(v) = cli.max_num_faces {
        settings.max_num_faces = v;
    }
    if let Some(v) = cli.thickness {
        settings.landmark_thickness = v;
    }
    if let Some(v) = cli.circle_radius {
        settings.landmark_circle_radius = v;
    }
    if let Some(v) = cli.tesselation_style {
        settings.tesselation_style = v;
    }
    if cli.no_points {
        settings.draw_landmarks = false;
    }
    if cli.no_mirror {
        settings.mirror = false;
    }
    if let Some(dir) = &cli.model_dir {
        settings.model_dir = Some(dir.clone());
    }

    settings.validate()?;

    let table_dirs = settings
        .model_dir
        .clone()
        .into_iter()
        .chain(model_resolver::model_cache_dir().ok());
    for dir in table_dirs {
        if settings.adopt_tesselation_table(&dir)? {
            log::info!("Using tesselation table from {}", dir.display());
            break;
        }
    }
    Ok(settings)
}

fn build_detector(
    cli: &Cli,
    settings: &Settings,
) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>> {
    if cli.synthetic {
        return Ok(Box::new(TrackingLandmarkDetector::new(
            PatternFaceDetector::new(),
            PatternLandmarkRegressor::new(),
        )));
    }

    let bundled = settings.model_dir.as_deref();
    log::info!("Resolving model: {FACE_DETECTOR_MODEL_NAME}");
    let detector_path = model_resolver::resolve(
        FACE_DETECTOR_MODEL_NAME,
        settings.detector_model_url.as_deref(),
        bundled,
        Some(Box::new(download_progress)),
    )?;
    log::info!("Resolving model: {FACE_LANDMARK_MODEL_NAME}");
    let landmark_path = model_resolver::resolve(
        FACE_LANDMARK_MODEL_NAME,
        settings.landmark_model_url.as_deref(),
        bundled,
        Some(Box::new(download_progress)),
    )?;

    Ok(Box::new(TrackingLandmarkDetector::new(
        OnnxBlazeFaceDetector::new(detector_path),
        OnnxFaceLandmarkRegressor::new(landmark_path),
    )))
}

fn build_source(cli: &Cli) -> Box<dyn FrameSource> {
    let base: Box<dyn FrameSource> = if cli.synthetic {
        Box::new(SyntheticFrameSource::new(640, 480, Some(cli.max_frames)))
    } else {
        Box::new(FfmpegFrameSource::new())
    };

    if cli.drop_frames {
        Box::new(ThreadedFrameSource::new(base, FrameDropPolicy::DropNewest))
    } else {
        base
    }
}

fn build_sink(cli: &Cli) -> Box<dyn DisplaySink> {
    match &cli.headless {
        Some(dir) => Box::new(ImageSequenceSink::new(dir)),
        None => Box::new(MinifbDisplaySink::new()),
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
