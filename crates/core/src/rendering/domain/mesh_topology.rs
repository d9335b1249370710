//! Connection topology for a landmark set: which landmark pairs get an edge.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// File name of the canonical tesselation table looked up next to the
/// models: a JSON array of `[a, b]` landmark index pairs.
pub const TESSELATION_TABLE_NAME: &str = "face_mesh_tesselation.json";

/// Edge set drawn between landmarks of one face.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MeshTopology {
    /// Triangulated mesh with fixed index pairs per landmark count; see
    /// [`TesselationCache`].
    #[default]
    Tesselation,
    /// Fixed landmark index pairs.
    Custom(Vec<(usize, usize)>),
    /// Points only.
    None,
}

impl MeshTopology {
    /// Edges for a face whose landmarks project to `points` (pixel space).
    ///
    /// Custom edges referring to indices past the end of `points` are skipped.
    pub fn edges(&self, points: &[(f32, f32)], cache: &TesselationCache) -> Vec<(usize, usize)> {
        match self {
            MeshTopology::Tesselation => cache.edges_for(points).to_vec(),
            MeshTopology::Custom(edges) => edges
                .iter()
                .copied()
                .filter(|&(a, b)| a < points.len() && b < points.len() && a != b)
                .collect(),
            MeshTopology::None => Vec::new(),
        }
    }
}

/// Edge tables for [`MeshTopology::Tesselation`], keyed by landmark count.
///
/// The first face of a given size is triangulated and its index pairs are
/// kept for every later face of that size, so the mesh follows the
/// landmarks instead of re-forming as they move.
#[derive(Debug, Default)]
pub struct TesselationCache {
    tables: Mutex<HashMap<usize, Arc<[(usize, usize)]>>>,
}

impl TesselationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edges_for(&self, points: &[(f32, f32)]) -> Arc<[(usize, usize)]> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables
            .entry(points.len())
            .or_insert_with(|| delaunay_edges(points).into())
            .clone()
    }
}

#[derive(Clone, Copy, Debug)]
struct Triangle {
    v: [usize; 3],
    cx: f64,
    cy: f64,
    r2: f64,
}

impl Triangle {
    fn new(v: [usize; 3], pts: &[(f64, f64)]) -> Self {
        let (ax, ay) = pts[v[0]];
        let (bx, by) = pts[v[1]];
        let (cx, cy) = pts[v[2]];
        let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
        if d.abs() < 1e-12 {
            // Collinear: any later point invalidates it.
            return Self {
                v,
                cx: (ax + bx + cx) / 3.0,
                cy: (ay + by + cy) / 3.0,
                r2: f64::INFINITY,
            };
        }
        let a2 = ax * ax + ay * ay;
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
        let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;
        let r2 = (ax - ux).powi(2) + (ay - uy).powi(2);
        Self {
            v,
            cx: ux,
            cy: uy,
            r2,
        }
    }

    fn circumcircle_contains(&self, (px, py): (f64, f64)) -> bool {
        (px - self.cx).powi(2) + (py - self.cy).powi(2) < self.r2
    }

    fn edges(&self) -> [(usize, usize); 3] {
        [
            ordered(self.v[0], self.v[1]),
            ordered(self.v[1], self.v[2]),
            ordered(self.v[2], self.v[0]),
        ]
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Bowyer-Watson triangulation; returns sorted unique `(low, high)` edges.
///
/// Duplicate points are inserted once; the duplicates get no edges.
pub fn delaunay_edges(points: &[(f32, f32)]) -> Vec<(usize, usize)> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }
    if n == 2 {
        return if points[0] == points[1] {
            Vec::new()
        } else {
            vec![(0, 1)]
        };
    }

    let mut pts: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x as f64, y as f64)).collect();

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for &(x, y) in &pts {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let mid_x = (min_x + max_x) / 2.0;
    let mid_y = (min_y + max_y) / 2.0;
    pts.push((mid_x - 20.0 * span, mid_y - span));
    pts.push((mid_x, mid_y + 20.0 * span));
    pts.push((mid_x + 20.0 * span, mid_y - span));

    let mut triangles = vec![Triangle::new([n, n + 1, n + 2], &pts)];

    for i in 0..n {
        let p = pts[i];
        if pts[..i].contains(&p) {
            continue;
        }

        let (bad, good): (Vec<Triangle>, Vec<Triangle>) = triangles
            .into_iter()
            .partition(|t| t.circumcircle_contains(p));
        triangles = good;

        let mut edge_count: std::collections::HashMap<(usize, usize), usize> =
            std::collections::HashMap::new();
        for t in &bad {
            for e in t.edges() {
                *edge_count.entry(e).or_default() += 1;
            }
        }
        for (edge, count) in edge_count {
            if count == 1 {
                triangles.push(Triangle::new([edge.0, edge.1, i], &pts));
            }
        }
    }

    let mut edges = BTreeSet::new();
    for t in triangles.iter().filter(|t| t.v.iter().all(|&v| v < n)) {
        for e in t.edges() {
            edges.insert(e);
        }
    }
    edges.into_iter().collect()
}
