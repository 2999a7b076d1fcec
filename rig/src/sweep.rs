use goniolab_analyzer::filter::{
    annotate, annotate_labeled, load_font, status_label, FrameFilter, Measurement,
};
use goniolab_analyzer::keys::{annotated_file_name, frame_file_name, unlabeled_file_name};
use goniolab_analyzer::series::{AngleSeries, SeriesError};
use goniolab_common::config::{AcquisitionConfig, StageConfig, SweepConfig};
use goniolab_common::frame::{Frame, FrameError};
use std::path::Path;
use tracing::{info, warn};

use crate::camera::{Camera, CameraError};
use crate::stage::{Stage, StageError, StageSession};

/// Angles visited by a sweep and how far the stage turns between them.
///
/// Built only through [`SweepPlan::new`], which rejects plans whose last
/// angle or per-point step count does not fit in an `i32`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    start_angle: i32,
    step_angle: i32,
    count: i32,
    steps_per_point: i32,
}

impl SweepPlan {
    pub fn new(
        start_angle: i32,
        step_angle: i32,
        count: u32,
        steps_per_degree: u32,
    ) -> Result<Self, SweepError> {
        let count = i32::try_from(count)
            .map_err(|_| SweepError::Plan(format!("point count {count} is too large")))?;
        count
            .saturating_sub(1)
            .max(0)
            .checked_mul(step_angle)
            .and_then(|span| start_angle.checked_add(span))
            .ok_or_else(|| {
                SweepError::Plan(format!(
                    "{count} points of {step_angle} degrees from {start_angle} overflow the angle range"
                ))
            })?;
        let steps_per_point = i32::try_from(steps_per_degree)
            .ok()
            .and_then(|spd| step_angle.checked_mul(spd))
            .ok_or_else(|| {
                SweepError::Plan(format!(
                    "step of {step_angle} degrees at {steps_per_degree} steps/degree overflows the stage step count"
                ))
            })?;
        Ok(Self {
            start_angle,
            step_angle,
            count,
            steps_per_point,
        })
    }

    pub fn from_config(sweep: &SweepConfig, stage: &StageConfig) -> Result<Self, SweepError> {
        Self::new(
            sweep.start_angle,
            sweep.step_angle,
            sweep.count,
            stage.steps_per_degree,
        )
    }

    pub fn start_angle(&self) -> i32 {
        self.start_angle
    }

    pub fn step_angle(&self) -> i32 {
        self.step_angle
    }

    pub fn count(&self) -> u32 {
        self.count.unsigned_abs()
    }

    pub fn angles(&self) -> impl Iterator<Item = i32> + '_ {
        (0..self.count).map(move |i| self.start_angle + i * self.step_angle)
    }

    /// Stage steps between consecutive points.
    pub fn steps_per_point(&self) -> i32 {
        self.steps_per_point
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scored: usize,
    pub saturated: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("stage error: {0}")]
    Stage(#[from] StageError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("failed to prepare directory {0}: {1}")]
    Dir(String, std::io::Error),
    #[error("invalid sweep plan: {0}")]
    Plan(String),
    #[error("failed to export results: {0}")]
    Export(#[from] SeriesError),
}

/// Capture the frame for `angle`, score it and record it into `series`.
///
/// The image is kept as `{image_dir}/{angle}.{ext}`. Saturated frames are
/// returned as [`Measurement::Saturated`] and are not added as samples.
pub fn capture_at(
    camera: &mut dyn Camera,
    filter: &dyn FrameFilter,
    angle: i32,
    acquisition: &AcquisitionConfig,
    series: &mut AngleSeries,
) -> Result<Measurement, SweepError> {
    let path = acquisition
        .image_dir
        .join(frame_file_name(angle, &acquisition.image_ext));
    let (frame, measurement) = capture_and_measure(camera, filter, &path, acquisition)?;

    if let Some(dir) = &acquisition.annotated_dir {
        write_annotated(dir, acquisition.annotation_font.as_deref(), angle, &frame, &measurement);
    }

    match measurement.score() {
        Some(score) => info!(angle, score, path = path.display().to_string(), "frame scored"),
        None => warn!(angle, path = path.display().to_string(), "image is saturated"),
    }
    series.record(angle, &measurement);
    Ok(measurement)
}

/// Quick single-shot capture to `{image_dir}/img.{ext}`, overwritten on
/// every call. Nothing is recorded.
pub fn capture_unlabeled(
    camera: &mut dyn Camera,
    filter: &dyn FrameFilter,
    acquisition: &AcquisitionConfig,
) -> Result<Measurement, SweepError> {
    let path = acquisition
        .image_dir
        .join(unlabeled_file_name(&acquisition.image_ext));
    let (_, measurement) = capture_and_measure(camera, filter, &path, acquisition)?;
    if measurement.is_saturated() {
        warn!(path = path.display().to_string(), "image is saturated");
    }
    Ok(measurement)
}

/// Step the stage through `plan`, capturing at every angle.
///
/// The stage is assumed to sit at the plan's start angle; it is moved before
/// every point after the first. Any stage or camera failure stops the
/// sweep and is returned; samples recorded so far stay in `series`.
pub fn run_sweep<S: Stage>(
    session: &mut StageSession<S>,
    camera: &mut dyn Camera,
    filter: &dyn FrameFilter,
    plan: &SweepPlan,
    acquisition: &AcquisitionConfig,
    series: &mut AngleSeries,
) -> Result<SweepReport, SweepError> {
    info!(
        start = plan.start_angle(),
        step = plan.step_angle(),
        count = plan.count(),
        filter = filter.name(),
        "starting sweep"
    );

    let mut report = SweepReport::default();
    for (i, angle) in plan.angles().enumerate() {
        if i > 0 {
            session.stage().move_by(plan.steps_per_point(), 0)?;
        }
        let measurement = capture_at(camera, filter, angle, acquisition, series)?;
        if measurement.is_saturated() {
            report.saturated += 1;
        } else {
            report.scored += 1;
        }
    }

    let position = session.stage().position()?;
    info!(
        scored = report.scored,
        saturated = report.saturated,
        steps = position.steps,
        microsteps = position.microsteps,
        "sweep complete"
    );
    Ok(report)
}

/// Write `series` to the configured CSV and JSON files.
///
/// Both files are attempted even if the first fails; the first failure is
/// returned.
pub fn export_series(
    series: &AngleSeries,
    acquisition: &AcquisitionConfig,
) -> Result<(), SweepError> {
    let csv = match &acquisition.results_csv {
        Some(path) => series.write_csv(path),
        None => Ok(()),
    };
    let json = match &acquisition.results_json {
        Some(path) => series.write_json(path),
        None => Ok(()),
    };
    csv.and(json)?;
    Ok(())
}

fn capture_and_measure(
    camera: &mut dyn Camera,
    filter: &dyn FrameFilter,
    path: &Path,
    acquisition: &AcquisitionConfig,
) -> Result<(Frame, Measurement), SweepError> {
    std::fs::create_dir_all(&acquisition.image_dir)
        .map_err(|e| SweepError::Dir(acquisition.image_dir.display().to_string(), e))?;
    camera.capture_to(path)?;
    let frame = Frame::open_gray(path)?;
    let measurement = filter.evaluate(&frame);
    Ok((frame, measurement))
}

// Diagnostics only; failures are logged and never abort a capture.
fn write_annotated(
    dir: &Path,
    font: Option<&Path>,
    angle: i32,
    frame: &Frame,
    measurement: &Measurement,
) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(dir = dir.display().to_string(), error = %e, "failed to create annotated dir");
        return;
    }
    let verdict = measurement.verdict();
    let image = match font.map(load_font) {
        Some(Ok(font)) => annotate_labeled(frame, verdict, &font, &status_label(angle, verdict)),
        Some(Err(e)) => {
            warn!(error = %e, "annotating without caption");
            annotate(frame, verdict)
        }
        None => annotate(frame, verdict),
    };
    let path = dir.join(annotated_file_name(angle));
    if let Err(e) = image.save(&path) {
        warn!(path = path.display().to_string(), error = %e, "failed to write annotated frame");
    }
}
