use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Rig configuration. Every section has defaults, so an empty file is valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub stage: StageConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Saturation detection and intensity scoring thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Samples at or below this value are zeroed before blob detection.
    #[serde(default = "default_saturation_cutoff")]
    pub saturation_cutoff: u8,
    /// Rounds of 3x3 erosion applied to the thresholded frame.
    #[serde(default = "default_erode_iterations")]
    pub erode_iterations: u8,
    /// Rounds of 3x3 dilation applied after erosion.
    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u8,
    /// Fraction of 255-valued pixels among non-black pixels above which
    /// the frame counts as clipped.
    #[serde(default = "default_saturated_fraction_threshold")]
    pub saturated_fraction_threshold: f64,
    /// Minimum enclosing-circle radius (pixels) a blob must exceed.
    /// Tune per sensor resolution.
    #[serde(default = "default_min_blob_radius")]
    pub min_blob_radius: f64,
    /// Scoring strategy: "hls_lightness" or "gray_sum".
    #[serde(default = "default_scorer")]
    pub scorer: String,
}

/// Hardware passthrough settings for the still-capture command.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_command")]
    pub command: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Microseconds; 0 lets the sensor pick.
    #[serde(default)]
    pub shutter_speed_us: u64,
    /// 0 lets the sensor pick.
    #[serde(default)]
    pub iso: u32,
    #[serde(default = "default_exposure_mode")]
    pub exposure_mode: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionConfig {
    /// "capture", "single" or "sweep".
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    /// When set, an annotated copy of every captured frame is written here.
    #[serde(default)]
    pub annotated_dir: Option<PathBuf>,
    /// Font used to caption annotated frames; without one only the
    /// status marker is drawn.
    #[serde(default)]
    pub annotation_font: Option<PathBuf>,
    #[serde(default = "default_image_ext")]
    pub image_ext: String,
    #[serde(default)]
    pub results_csv: Option<PathBuf>,
    #[serde(default)]
    pub results_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    /// Device name or path of the stage controller.
    #[serde(default = "default_stage_device")]
    pub device: String,
    /// Speed written to the controller's move settings when the stage opens.
    #[serde(default)]
    pub speed: Option<u32>,
    #[serde(default = "default_steps_per_degree")]
    pub steps_per_degree: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub start_angle: i32,
    #[serde(default = "default_step_angle")]
    pub step_angle: i32,
    #[serde(default = "default_sweep_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            saturation_cutoff: default_saturation_cutoff(),
            erode_iterations: default_erode_iterations(),
            dilate_iterations: default_dilate_iterations(),
            saturated_fraction_threshold: default_saturated_fraction_threshold(),
            min_blob_radius: default_min_blob_radius(),
            scorer: default_scorer(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: default_camera_command(),
            width: default_width(),
            height: default_height(),
            framerate: default_framerate(),
            shutter_speed_us: 0,
            iso: 0,
            exposure_mode: default_exposure_mode(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            image_dir: default_image_dir(),
            annotated_dir: None,
            annotation_font: None,
            image_ext: default_image_ext(),
            results_csv: None,
            results_json: None,
        }
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            device: default_stage_device(),
            speed: None,
            steps_per_degree: default_steps_per_degree(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start_angle: 0,
            step_angle: default_step_angle(),
            count: default_sweep_count(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_saturation_cutoff() -> u8 {
    254
}
fn default_erode_iterations() -> u8 {
    2
}
fn default_dilate_iterations() -> u8 {
    4
}
fn default_saturated_fraction_threshold() -> f64 {
    0.95
}
fn default_min_blob_radius() -> f64 {
    90.0
}
fn default_scorer() -> String {
    "hls_lightness".into()
}
fn default_camera_command() -> String {
    "libcamera-still".into()
}
fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_framerate() -> u32 {
    10
}
fn default_exposure_mode() -> String {
    "off".into()
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_mode() -> String {
    "capture".into()
}
fn default_image_dir() -> PathBuf {
    PathBuf::from("captures")
}
fn default_image_ext() -> String {
    "png".into()
}
fn default_stage_device() -> String {
    "xi-com:///dev/ximc/00000001".into()
}
fn default_steps_per_degree() -> u32 {
    100
}
fn default_step_angle() -> i32 {
    5
}
fn default_sweep_count() -> u32 {
    19
}
fn default_log_level() -> String {
    "info".into()
}
