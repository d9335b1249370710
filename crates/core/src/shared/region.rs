/// Axis-aligned rectangle in normalized frame coordinates (`[0,1]` of the
/// frame's width and height; may extend past the edges).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Tight bounding box of a point cloud. `None` for an empty input.
    pub fn bounding(points: impl IntoIterator<Item = (f32, f32)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
        for (x, y) in iter {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Square region sharing this region's center, with side
    /// `scale * max(width * aspect, height)` measured in pixels.
    ///
    /// `aspect` is frame width / frame height; the result is square in
    /// pixel space, not in normalized space.
    pub fn square_around(&self, scale: f32, aspect: f32) -> Self {
        let (cx, cy) = self.center();
        let side_px_h = (self.width * aspect).max(self.height) * scale;
        let h = side_px_h;
        let w = side_px_h / aspect;
        Self::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }

    pub fn iou(&self, other: &Region) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }

        inter / (self.area() + other.area() - inter)
    }

    /// Greedy deduplication over regions already sorted by preference:
    /// keeps a region only if its IoU with every previously kept region is
    /// at or below the threshold. Returns the indices of the kept regions.
    pub fn deduplicate(regions: &[Region], iou_threshold: f32) -> Vec<usize> {
        let mut kept: Vec<usize> = Vec::with_capacity(regions.len());
        for (i, r) in regions.iter().enumerate() {
            let dominated = kept.iter().any(|&k| r.iou(&regions[k]) > iou_threshold);
            if !dominated {
                kept.push(i);
            }
        }
        kept
    }
}
