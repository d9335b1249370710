use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::landmark_detector::DetectorConfig;
use crate::pipeline::frame_pipeline::PipelineConfig;
use crate::preprocessing::preprocessor::Preprocessor;
use crate::rendering::domain::draw_style::{DrawStyle, LineStyle};
use crate::rendering::domain::mesh_topology::{MeshTopology, TESSELATION_TABLE_NAME};
use crate::shared::constants::{
    DEFAULT_MAX_CONSECUTIVE_READ_ERRORS, DEFAULT_POLL_TIMEOUT_MS, DEFAULT_QUIT_KEY,
    DEFAULT_WINDOW_NAME,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Every tunable of the viewer. Missing keys in a settings file take their
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub max_num_faces: usize,
    pub landmark_thickness: u32,
    pub landmark_circle_radius: u32,
    pub tesselation_style: LineStyle,
    pub draw_landmarks: bool,
    /// Draw connections at all; `false` leaves points only.
    pub draw_mesh: bool,
    /// Explicit edge list replacing the triangulated mesh.
    pub custom_connections: Option<Vec<[usize; 2]>>,
    pub landmark_color: [u8; 3],
    pub connection_color: [u8; 3],
    pub mirror: bool,
    pub window_name: String,
    pub quit_keys: Vec<i32>,
    pub poll_timeout_ms: u64,
    pub max_consecutive_read_errors: usize,
    pub model_dir: Option<PathBuf>,
    pub detector_model_url: Option<String>,
    pub landmark_model_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let detector = DetectorConfig::default();
        let style = DrawStyle::default();
        Self {
            min_detection_confidence: detector.min_detection_confidence,
            min_tracking_confidence: detector.min_tracking_confidence,
            max_num_faces: detector.max_num_faces,
            landmark_thickness: style.thickness,
            landmark_circle_radius: style.circle_radius,
            tesselation_style: style.line_style,
            draw_landmarks: style.draw_points,
            draw_mesh: true,
            custom_connections: None,
            landmark_color: style.landmark_color,
            connection_color: style.connection_color,
            mirror: true,
            window_name: DEFAULT_WINDOW_NAME.to_string(),
            quit_keys: vec![DEFAULT_QUIT_KEY],
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            max_consecutive_read_errors: DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
            model_dir: None,
            detector_model_url: None,
            landmark_model_url: None,
        }
    }
}

impl Settings {
    /// `<config dir>/FaceMesh/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceMesh").join("settings.json"))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Settings =
            serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads `path` when given, otherwise the default location if a file
    /// exists there, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                log::debug!("Loading settings from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |e| SettingsError::Write {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(SettingsError::Serialize)?;
        fs::write(path, json).map_err(write_err)
    }

    /// Adopts the tesselation table stored next to the models in `dir`
    /// (`face_mesh_tesselation.json`, an array of `[a, b]` pairs) unless
    /// connections are already configured. Returns whether a table was
    /// adopted.
    pub fn adopt_tesselation_table(&mut self, dir: &Path) -> Result<bool, SettingsError> {
        if self.custom_connections.is_some() {
            return Ok(false);
        }
        let path = dir.join(TESSELATION_TABLE_NAME);
        if !path.is_file() {
            return Ok(false);
        }
        let json = fs::read_to_string(&path).map_err(|e| SettingsError::Read {
            path: path.clone(),
            source: e,
        })?;
        let pairs: Vec<[usize; 2]> =
            serde_json::from_str(&json).map_err(|e| SettingsError::Parse { path, source: e })?;
        self.custom_connections = Some(pairs);
        Ok(true)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.detector_config()
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        if self.landmark_thickness == 0 {
            return Err(SettingsError::Invalid(
                "landmark_thickness must be at least 1".to_string(),
            ));
        }
        if self.window_name.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "window_name must not be empty".to_string(),
            ));
        }
        if self.max_consecutive_read_errors == 0 {
            return Err(SettingsError::Invalid(
                "max_consecutive_read_errors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            min_detection_confidence: self.min_detection_confidence,
            min_tracking_confidence: self.min_tracking_confidence,
            max_num_faces: self.max_num_faces,
        }
    }

    pub fn draw_style(&self) -> DrawStyle {
        let topology = if !self.draw_mesh {
            MeshTopology::None
        } else if let Some(edges) = &self.custom_connections {
            MeshTopology::Custom(edges.iter().map(|&[a, b]| (a, b)).collect())
        } else {
            MeshTopology::Tesselation
        };
        DrawStyle {
            thickness: self.landmark_thickness,
            circle_radius: self.landmark_circle_radius,
            landmark_color: self.landmark_color,
            connection_color: self.connection_color,
            topology,
            line_style: self.tesselation_style,
            draw_points: self.draw_landmarks,
        }
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.mirror)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            window_name: self.window_name.clone(),
            quit_keys: self.quit_keys.clone(),
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            max_consecutive_read_errors: self.max_consecutive_read_errors,
        }
    }
}
