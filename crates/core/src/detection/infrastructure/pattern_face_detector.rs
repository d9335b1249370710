//! Model-free reference stages that recognise a synthetic face pattern: one
//! uniform blob standing out from a uniform background.
//!
//! Confidence is the blob's mean contrast against the background
//! (`|fg - bg| / 255`), so dimming the pattern lowers the score smoothly.
//! Used for offline demos with the synthetic frame source and for
//! deterministic tests of the whole pipeline.

use std::f32::consts::TAU;

use crate::detection::domain::face_stages::{FaceBox, FaceBoxDetector, LandmarkRegressor};
use crate::detection::domain::landmark::{Landmark, LandmarkSet};
use crate::detection::domain::landmark_detector::DetectorInitError;
use crate::shared::constants::FACE_MESH_LANDMARK_COUNT;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Luma difference from the background that marks a foreground sample.
const FOREGROUND_DELTA: f32 = 6.0;

/// Fewer foreground samples than this is noise, not a face.
const MIN_FOREGROUND_SAMPLES: usize = 12;

/// Target number of samples along the shorter side of the scanned area.
const SAMPLES_PER_SIDE: u32 = 160;

/// Rings in the generated landmark layout; `FACE_MESH_LANDMARK_COUNT` must
/// be a multiple of this.
const LAYOUT_RINGS: usize = 12;

/// Depth of the layout's center relative to its rim, in units of face width.
const LAYOUT_DEPTH: f32 = 0.1;

/// Pixel-space rectangle, end-exclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PatternStats {
    bounds: PixelRect,
    contrast: f32,
}

/// Finds the foreground blob inside `area` of `frame`.
///
/// The background level is the median luma along the area's border.
fn measure_pattern(frame: &Frame, area: PixelRect) -> Option<PatternStats> {
    let w = area.x1.saturating_sub(area.x0);
    let h = area.y1.saturating_sub(area.y0);
    if w < 3 || h < 3 {
        return None;
    }
    let step = (w.min(h) / SAMPLES_PER_SIDE).max(1);

    let mut border: Vec<f32> = Vec::new();
    for x in (area.x0..area.x1).step_by(step as usize) {
        border.push(frame.luma_at(x, area.y0));
        border.push(frame.luma_at(x, area.y1 - 1));
    }
    for y in (area.y0..area.y1).step_by(step as usize) {
        border.push(frame.luma_at(area.x0, y));
        border.push(frame.luma_at(area.x1 - 1, y));
    }
    border.sort_by(f32::total_cmp);
    let background = border[border.len() / 2];

    let mut count = 0usize;
    let mut delta_sum = 0.0f32;
    let mut bounds = PixelRect {
        x0: u32::MAX,
        y0: u32::MAX,
        x1: 0,
        y1: 0,
    };
    for y in (area.y0 + 1..area.y1 - 1).step_by(step as usize) {
        for x in (area.x0 + 1..area.x1 - 1).step_by(step as usize) {
            let delta = (frame.luma_at(x, y) - background).abs();
            if delta > FOREGROUND_DELTA {
                count += 1;
                delta_sum += delta;
                bounds.x0 = bounds.x0.min(x);
                bounds.y0 = bounds.y0.min(y);
                bounds.x1 = bounds.x1.max(x + 1);
                bounds.y1 = bounds.y1.max(y + 1);
            }
        }
    }

    if count < MIN_FOREGROUND_SAMPLES {
        return None;
    }
    Some(PatternStats {
        bounds,
        contrast: (delta_sum / count as f32 / 255.0).clamp(0.0, 1.0),
    })
}

/// Normalized region → pixel rectangle clipped to the frame.
fn clip_to_frame(region: &Region, frame: &Frame) -> PixelRect {
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    PixelRect {
        x0: (region.x * fw).floor().clamp(0.0, fw) as u32,
        y0: (region.y * fh).floor().clamp(0.0, fh) as u32,
        x1: ((region.x + region.width) * fw).ceil().clamp(0.0, fw) as u32,
        y1: ((region.y + region.height) * fh).ceil().clamp(0.0, fh) as u32,
    }
}

fn to_region(rect: PixelRect, frame: &Frame) -> Region {
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    Region::new(
        rect.x0 as f32 / fw,
        rect.y0 as f32 / fh,
        (rect.x1 - rect.x0) as f32 / fw,
        (rect.y1 - rect.y0) as f32 / fh,
    )
}

/// Concentric-ellipse landmark layout filling `bounds`.
///
/// Each ring is rotated a little against the previous one so no four points
/// of neighbouring rings are cocircular.
fn elliptical_layout(bounds: &Region, count: usize) -> Vec<Landmark> {
    let per_ring = count / LAYOUT_RINGS;
    let (cx, cy) = bounds.center();
    let (ax, ay) = (bounds.width / 2.0, bounds.height / 2.0);

    let mut points = Vec::with_capacity(count);
    for ring in 0..LAYOUT_RINGS {
        let r = (ring + 1) as f32 / LAYOUT_RINGS as f32;
        let twist = ring as f32 * 0.13;
        for k in 0..per_ring {
            let angle = TAU * k as f32 / per_ring as f32 + twist;
            points.push(Landmark::new(
                cx + r * ax * angle.cos(),
                cy + r * ay * angle.sin(),
                -LAYOUT_DEPTH * bounds.width * (1.0 - r * r),
            ));
        }
    }
    points
}

/// Face box stage for the synthetic pattern. Reports at most one face.
#[derive(Default)]
pub struct PatternFaceDetector;

impl PatternFaceDetector {
    pub fn new() -> Self {
        Self
    }
}

impl FaceBoxDetector for PatternFaceDetector {
    fn load(&mut self) -> Result<(), DetectorInitError> {
        Ok(())
    }

    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        let whole = PixelRect {
            x0: 0,
            y0: 0,
            x1: frame.width(),
            y1: frame.height(),
        };
        Ok(measure_pattern(frame, whole)
            .map(|stats| FaceBox {
                region: to_region(stats.bounds, frame),
                score: stats.contrast,
            })
            .into_iter()
            .collect())
    }
}

/// Landmark stage for the synthetic pattern: fits the fixed-size layout to
/// the blob inside the crop region.
#[derive(Default)]
pub struct PatternLandmarkRegressor;

impl PatternLandmarkRegressor {
    pub fn new() -> Self {
        Self
    }
}

impl LandmarkRegressor for PatternLandmarkRegressor {
    fn load(&mut self) -> Result<(), DetectorInitError> {
        Ok(())
    }

    fn regress(
        &mut self,
        frame: &Frame,
        roi: &Region,
    ) -> Result<LandmarkSet, Box<dyn std::error::Error>> {
        let area = clip_to_frame(roi, frame);
        match measure_pattern(frame, area) {
            Some(stats) => {
                let bounds = to_region(stats.bounds, frame);
                Ok(LandmarkSet::new(
                    elliptical_layout(&bounds, FACE_MESH_LANDMARK_COUNT),
                    stats.contrast,
                ))
            }
            None => Ok(LandmarkSet::new(
                elliptical_layout(roi, FACE_MESH_LANDMARK_COUNT),
                0.0,
            )),
        }
    }
}

/// Draws the synthetic face pattern: a filled ellipse of `face_level` on a
/// `background_level` field. Shared by the synthetic source and tests.
pub fn paint_pattern(
    frame: &mut Frame,
    center: (f32, f32),
    axes: (f32, f32),
    background_level: u8,
    face_level: u8,
) {
    let w = frame.width() as usize;
    let c = frame.channels() as usize;
    let h = frame.height() as usize;
    let data = frame.data_mut();
    for y in 0..h {
        for x in 0..w {
            let dx = (x as f32 + 0.5 - center.0) / axes.0;
            let dy = (y as f32 + 0.5 - center.1) / axes.1;
            let level = if dx * dx + dy * dy <= 1.0 {
                face_level
            } else {
                background_level
            };
            let offset = (y * w + x) * c;
            data[offset..offset + 3].fill(level);
        }
    }
}
