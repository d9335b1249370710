use image::{ImageBuffer, Rgb, Rgba};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, Canvas};

use crate::detection::domain::landmark::DetectionResult;
use crate::rendering::domain::draw_style::{DrawStyle, LineStyle};
use crate::rendering::domain::mesh_topology::TesselationCache;
use crate::rendering::domain::overlay_renderer::{OverlayRenderer, RenderError};
use crate::shared::frame::Frame;

type Point = (f32, f32);

/// Draws the mesh straight into the frame buffer with `imageproc`.
///
/// Works on 3- and 4-channel frames in either channel order; colors are
/// reordered to match the frame.
#[derive(Debug, Default)]
pub struct CpuOverlayRenderer {
    tesselation: TesselationCache,
}

impl CpuOverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlayRenderer for CpuOverlayRenderer {
    fn draw(
        &self,
        frame: Frame,
        result: &DetectionResult,
        style: &DrawStyle,
    ) -> Result<Frame, RenderError> {
        if result.is_empty() {
            return Ok(frame);
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(RenderError::EmptyFrame);
        }

        let (w, h) = (frame.width(), frame.height());
        let (channels, space, index) = (frame.channels(), frame.color_space(), frame.index());
        let edge = space.from_rgb(style.connection_color);
        let point = space.from_rgb(style.landmark_color);

        let data = match channels {
            3 => {
                let mut canvas = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(w, h, frame.into_data())
                    .ok_or(RenderError::BufferMismatch)?;
                annotate(&mut canvas, w, h, result, style, &self.tesselation, Rgb(edge), Rgb(point));
                canvas.into_raw()
            }
            4 => {
                let mut canvas = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(w, h, frame.into_data())
                    .ok_or(RenderError::BufferMismatch)?;
                let edge = Rgba([edge[0], edge[1], edge[2], 255]);
                let point = Rgba([point[0], point[1], point[2], 255]);
                annotate(&mut canvas, w, h, result, style, &self.tesselation, edge, point);
                canvas.into_raw()
            }
            channels => return Err(RenderError::UnsupportedLayout { channels }),
        };

        Frame::try_new(data, w, h, channels, space, index).map_err(|_| RenderError::BufferMismatch)
    }
}

#[allow(clippy::too_many_arguments)]
fn annotate<C: Canvas>(
    canvas: &mut C,
    width: u32,
    height: u32,
    result: &DetectionResult,
    style: &DrawStyle,
    tesselation: &TesselationCache,
    edge_color: C::Pixel,
    point_color: C::Pixel,
) {
    let bounds = (width as f32, height as f32);
    for face in result.faces() {
        let points: Vec<Point> = face
            .landmarks()
            .iter()
            .map(|l| l.to_pixel(width, height))
            .collect();

        for (a, b) in style.topology.edges(&points, tesselation) {
            for (p, q) in visible_segments(points[a], points[b], style.line_style, style.thickness, bounds) {
                draw_thick_segment(canvas, p, q, style.thickness, edge_color);
            }
        }

        if style.draw_points {
            let r = style.circle_radius as f32;
            for &(x, y) in &points {
                if !(x.is_finite() && y.is_finite())
                    || x < -r
                    || y < -r
                    || x > bounds.0 + r
                    || y > bounds.1 + r
                {
                    continue;
                }
                draw_filled_circle_mut(
                    canvas,
                    (x.round() as i32, y.round() as i32),
                    style.circle_radius as i32,
                    point_color,
                );
            }
        }
    }
}

/// The on-screen dashes of `a -> b`: the segment is clipped to the frame
/// (plus a stroke-width margin) before the dash pattern is laid out.
fn visible_segments(
    a: Point,
    b: Point,
    line_style: LineStyle,
    thickness: u32,
    (width, height): (f32, f32),
) -> Vec<(Point, Point)> {
    let margin = thickness.max(1) as f32 + 1.0;
    let rect = (-margin, -margin, width + margin, height + margin);
    match clip_to_rect(a, b, rect) {
        Some(range) => dash_segments(a, b, line_style.pattern(), thickness.max(1) as f32, range),
        None => Vec::new(),
    }
}

/// Liang-Barsky: the parameter range `[t0, t1]` of `a -> b` inside
/// `(x0, y0, x1, y1)`, or `None` when the segment misses it.
fn clip_to_rect(a: Point, b: Point, (x0, y0, x1, y1): (f32, f32, f32, f32)) -> Option<(f32, f32)> {
    if !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite()) {
        return None;
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [(-dx, a.0 - x0), (dx, x1 - a.0), (-dy, a.1 - y0), (dy, y1 - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

/// Splits the `[t0, t1]` part of `a -> b` into the "on" runs of an
/// `(on, off)` pattern scaled by the stroke thickness. The pattern is
/// anchored at `a` whatever the range.
fn dash_segments(
    a: Point,
    b: Point,
    pattern: Option<(f32, f32)>,
    scale: f32,
    (t0, t1): (f32, f32),
) -> Vec<(Point, Point)> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let lerp = |t: f32| {
        if t <= 0.0 {
            a
        } else if t >= 1.0 {
            b
        } else {
            (a.0 + dx * t, a.1 + dy * t)
        }
    };
    let Some((on, off)) = pattern else {
        return vec![(lerp(t0), lerp(t1))];
    };
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f32::EPSILON {
        return vec![(a, a)];
    }

    let (on, period) = (on * scale, (on + off) * scale);
    let (start, end) = (t0 * len, t1 * len);
    let at = |s: f32| (a.0 + dx * s / len, a.1 + dy * s / len);
    let mut segments = Vec::new();
    let mut s = (start / period).floor() * period;
    while s < end {
        let (p, q) = (s.max(start), (s + on).min(end));
        if p < q {
            segments.push((at(p), at(q)));
        }
        s += period;
    }
    segments
}

/// Parallel one-pixel lines spread across the segment's normal.
fn draw_thick_segment<C: Canvas>(canvas: &mut C, a: Point, b: Point, thickness: u32, color: C::Pixel) {
    if thickness <= 1 {
        draw_line_segment_mut(canvas, a, b, color);
        return;
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    let (nx, ny) = if len <= f32::EPSILON {
        (0.0, 1.0)
    } else {
        (-dy / len, dx / len)
    };
    let half = (thickness - 1) as f32 / 2.0;
    for k in 0..thickness {
        let o = k as f32 - half;
        draw_line_segment_mut(
            canvas,
            (a.0 + nx * o, a.1 + ny * o),
            (b.0 + nx * o, b.1 + ny * o),
            color,
        );
    }
}
