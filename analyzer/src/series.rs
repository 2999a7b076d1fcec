use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::filter::Measurement;

const CSV_HEADER: &str = "angle,intensity,recorded_at_ms";

/// One scored point of an intensity-vs-angle curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AngleSample {
    pub angle: i32,
    pub intensity: f64,
    pub recorded_at_ms: i64,
}

/// Caller-owned accumulator of angle samples.
///
/// Saturated measurements are never added as samples; their angles are
/// kept separately so a sweep can report which points need re-exposure.
#[derive(Debug, Default)]
pub struct AngleSeries {
    samples: Vec<AngleSample>,
    rejected: Vec<i32>,
}

impl AngleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for `angle`. Returns `true` if a sample was added.
    pub fn record(&mut self, angle: i32, measurement: &Measurement) -> bool {
        match measurement.score() {
            Some(intensity) => {
                self.samples.push(AngleSample {
                    angle,
                    intensity,
                    recorded_at_ms: chrono::Utc::now().timestamp_millis(),
                });
                debug!(angle, intensity, total = self.samples.len(), "sample recorded");
                true
            }
            None => {
                warn!(angle, "frame is saturated, sample not recorded");
                self.rejected.push(angle);
                false
            }
        }
    }

    /// Drop every sample and rejection to start a new angle range.
    pub fn reset(&mut self) {
        info!(
            samples = self.samples.len(),
            rejected = self.rejected.len(),
            "series reset"
        );
        self.samples.clear();
        self.rejected.clear();
    }

    pub fn samples(&self) -> &[AngleSample] {
        &self.samples
    }

    /// Angles whose frames were saturated, in capture order.
    pub fn rejected(&self) -> &[i32] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Write every sample as CSV, replacing any existing file.
    pub fn write_csv(&self, path: &Path) -> Result<(), SeriesError> {
        let file = File::create(path).map_err(|e| io_err(path, e))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{CSV_HEADER}").map_err(|e| io_err(path, e))?;
        for s in &self.samples {
            write_csv_row(&mut out, s).map_err(|e| io_err(path, e))?;
        }
        out.flush().map_err(|e| io_err(path, e))?;
        info!(path = path.display().to_string(), rows = self.samples.len(), "wrote CSV results");
        Ok(())
    }

    /// Append every sample to a CSV file, writing the header if the file
    /// is new or empty.
    pub fn append_csv(&self, path: &Path) -> Result<(), SeriesError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        let is_new = file.metadata().map_err(|e| io_err(path, e))?.len() == 0;
        let mut out = BufWriter::new(file);
        if is_new {
            writeln!(out, "{CSV_HEADER}").map_err(|e| io_err(path, e))?;
        }
        for s in &self.samples {
            write_csv_row(&mut out, s).map_err(|e| io_err(path, e))?;
        }
        out.flush().map_err(|e| io_err(path, e))?;
        debug!(path = path.display().to_string(), rows = self.samples.len(), "appended CSV results");
        Ok(())
    }

    /// Write the samples as a JSON array, replacing any existing file.
    pub fn write_json(&self, path: &Path) -> Result<(), SeriesError> {
        let file = File::create(path).map_err(|e| io_err(path, e))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, &self.samples)
            .map_err(|e| SeriesError::Json(e.to_string()))?;
        out.flush().map_err(|e| io_err(path, e))?;
        info!(path = path.display().to_string(), rows = self.samples.len(), "wrote JSON results");
        Ok(())
    }
}

fn write_csv_row(out: &mut impl Write, s: &AngleSample) -> std::io::Result<()> {
    writeln!(out, "{},{},{}", s.angle, s.intensity, s.recorded_at_ms)
}

fn io_err(path: &Path, e: std::io::Error) -> SeriesError {
    SeriesError::Io(path.display().to_string(), e)
}

#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error("failed to write results file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to serialize results: {0}")]
    Json(String),
}
