use serde::{Deserialize, Serialize};

use crate::rendering::domain::mesh_topology::MeshTopology;

/// How mesh edges are stroked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl LineStyle {
    /// `(on, off)` run lengths in pixels, or `None` for a continuous stroke.
    pub fn pattern(self) -> Option<(f32, f32)> {
        match self {
            LineStyle::Solid => None,
            LineStyle::Dashed => Some((4.0, 3.0)),
            LineStyle::Dotted => Some((1.0, 2.0)),
        }
    }
}

impl std::fmt::Display for LineStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineStyle::Solid => write!(f, "SOLID"),
            LineStyle::Dashed => write!(f, "DASHED"),
            LineStyle::Dotted => write!(f, "DOTTED"),
        }
    }
}

impl std::str::FromStr for LineStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SOLID" => Ok(LineStyle::Solid),
            "DASHED" => Ok(LineStyle::Dashed),
            "DOTTED" => Ok(LineStyle::Dotted),
            other => Err(format!(
                "line style must be SOLID, DASHED or DOTTED, got '{other}'"
            )),
        }
    }
}

/// Immutable rendering configuration for landmark sets. Built once at
/// startup and only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawStyle {
    pub thickness: u32,
    pub circle_radius: u32,
    /// RGB; written in the target frame's channel order.
    pub landmark_color: [u8; 3],
    pub connection_color: [u8; 3],
    pub topology: MeshTopology,
    pub line_style: LineStyle,
    pub draw_points: bool,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            thickness: 1,
            circle_radius: 1,
            landmark_color: [255, 0, 0],
            connection_color: [192, 192, 192],
            topology: MeshTopology::Tesselation,
            line_style: LineStyle::Solid,
            draw_points: true,
        }
    }
}
