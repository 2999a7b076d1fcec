use goniolab_common::config::CameraConfig;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// Still camera the acquisition loop captures through.
pub trait Camera {
    /// Capture one frame and write it to `path`.
    fn capture_to(&mut self, path: &Path) -> Result<(), CameraError>;

    fn settings(&self) -> &CameraConfig;

    fn set_framerate(&mut self, fps: u32);

    fn set_iso(&mut self, iso: u32);

    /// Exposure time in microseconds; 0 lets the sensor decide.
    fn set_shutter_speed(&mut self, micros: u64);
}

/// Camera driven by a still-capture command such as `libcamera-still`,
/// spawned once per frame.
pub struct StillCommandCamera {
    config: CameraConfig,
    captures: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera command '{0}' is unavailable: {1}")]
    Unavailable(String, String),
    #[error("failed to spawn camera command: {0}")]
    Spawn(String),
    #[error("camera command exited with non-zero status: {0}")]
    CaptureFailed(String),
    #[error("camera command succeeded but wrote no image to {0}")]
    MissingOutput(String),
}

impl StillCommandCamera {
    /// Probe the capture command and return a ready camera.
    pub fn open(config: CameraConfig) -> Result<Self, CameraError> {
        match Command::new(&config.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) if status.success() => {
                debug!(command = config.command, "camera command is available");
            }
            Ok(status) => {
                return Err(CameraError::Unavailable(
                    config.command.clone(),
                    format!("--version exited with {status}"),
                ));
            }
            Err(e) => {
                return Err(CameraError::Unavailable(config.command.clone(), e.to_string()));
            }
        }

        info!(
            command = config.command,
            width = config.width,
            height = config.height,
            framerate = config.framerate,
            shutter_speed_us = config.shutter_speed_us,
            iso = config.iso,
            exposure_mode = config.exposure_mode,
            "camera opened"
        );
        Ok(Self {
            config,
            captures: 0,
        })
    }

    pub fn captures(&self) -> u64 {
        self.captures
    }

    /// Command-line arguments for one capture to `path`.
    pub fn capture_args(&self, path: &Path) -> Vec<String> {
        let c = &self.config;
        let encoding = match path.extension().and_then(|e| e.to_str()) {
            Some("png") => "png",
            Some("bmp") => "bmp",
            _ => "jpg",
        };

        let mut args = vec![
            "--nopreview".to_string(),
            "--timeout".into(),
            c.timeout_ms.to_string(),
            "--width".into(),
            c.width.to_string(),
            "--height".into(),
            c.height.to_string(),
            "--framerate".into(),
            c.framerate.to_string(),
            "--encoding".into(),
            encoding.into(),
        ];
        if c.shutter_speed_us > 0 {
            args.extend(["--shutter".into(), c.shutter_speed_us.to_string()]);
        }
        // Sensor gain is 1.0 at ISO 100.
        if c.iso > 0 {
            args.extend(["--gain".into(), format!("{:.2}", c.iso as f64 / 100.0)]);
        }
        if !matches!(c.exposure_mode.as_str(), "off" | "auto") {
            args.extend(["--exposure".into(), c.exposure_mode.clone()]);
        }
        args.extend(["--output".into(), path.to_string_lossy().into_owned()]);
        args
    }
}

impl Camera for StillCommandCamera {
    fn capture_to(&mut self, path: &Path) -> Result<(), CameraError> {
        let output = Command::new(&self.config.command)
            .args(self.capture_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| CameraError::Spawn(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(stderr = %stderr, "camera command exited with error");
            return Err(CameraError::CaptureFailed(stderr.into_owned()));
        }
        if !path.is_file() {
            return Err(CameraError::MissingOutput(path.display().to_string()));
        }

        self.captures += 1;
        debug!(
            path = path.display().to_string(),
            captures = self.captures,
            "frame captured"
        );
        Ok(())
    }

    fn settings(&self) -> &CameraConfig {
        &self.config
    }

    fn set_framerate(&mut self, fps: u32) {
        self.config.framerate = fps;
    }

    fn set_iso(&mut self, iso: u32) {
        self.config.iso = iso;
    }

    fn set_shutter_speed(&mut self, micros: u64) {
        self.config.shutter_speed_us = micros;
    }
}

impl Drop for StillCommandCamera {
    fn drop(&mut self) {
        info!(captures = self.captures, "camera closed");
    }
}
