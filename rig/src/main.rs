use goniolab_analyzer::filter::{build_filter, FrameFilter};
use goniolab_analyzer::series::AngleSeries;
use goniolab_common::config::Config;
use goniolab_rig::camera::StillCommandCamera;
use goniolab_rig::stage::{ManualStage, StageSession};
use goniolab_rig::sweep::{capture_at, capture_unlabeled, export_series, run_sweep, SweepPlan};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Usage: goniolab-rig [config.toml] [angle]
fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("goniolab.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        mode = config.acquisition.mode,
        image_dir = config.acquisition.image_dir.display().to_string(),
        scorer = config.filter.scorer,
        camera = config.camera.command,
        "starting goniolab rig"
    );

    let filter = match build_filter(&config.filter) {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "invalid filter configuration");
            return ExitCode::FAILURE;
        }
    };

    // Everything that can be rejected up front is checked before the
    // camera is touched.
    let mode = match select_mode(&config, std::env::args().nth(2)) {
        Ok(mode) => mode,
        Err(e) => {
            error!(error = %e, "invalid invocation");
            return match e {
                ModeError::MissingAngle => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            };
        }
    };

    let mut camera = match StillCommandCamera::open(config.camera.clone()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to open camera");
            return ExitCode::FAILURE;
        }
    };

    match mode {
        Mode::Capture(angle) => capture(&config, &mut camera, filter.as_ref(), angle),
        Mode::Single => match capture_unlabeled(&mut camera, filter.as_ref(), &config.acquisition) {
            Ok(m) => {
                match m.score() {
                    Some(score) => println!("{score}"),
                    None => println!("saturated"),
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "capture failed");
                ExitCode::FAILURE
            }
        },
        Mode::Sweep(plan) => sweep(&config, &mut camera, filter.as_ref(), &plan),
    }
}

#[derive(Debug)]
enum Mode {
    Capture(i32),
    Single,
    Sweep(SweepPlan),
}

#[derive(Debug, thiserror::Error)]
enum ModeError {
    #[error("capture mode needs an integer angle argument")]
    MissingAngle,
    #[error("invalid sweep configuration: {0}")]
    Plan(#[from] goniolab_rig::sweep::SweepError),
    #[error("unknown acquisition mode '{0}', expected 'capture', 'single' or 'sweep'")]
    Unknown(String),
}

fn select_mode(config: &Config, angle_arg: Option<String>) -> Result<Mode, ModeError> {
    match config.acquisition.mode.as_str() {
        "capture" => angle_arg
            .and_then(|a| a.parse::<i32>().ok())
            .map(Mode::Capture)
            .ok_or(ModeError::MissingAngle),
        "single" => Ok(Mode::Single),
        "sweep" => Ok(Mode::Sweep(SweepPlan::from_config(&config.sweep, &config.stage)?)),
        other => Err(ModeError::Unknown(other.to_string())),
    }
}

fn capture(
    config: &Config,
    camera: &mut StillCommandCamera,
    filter: &dyn FrameFilter,
    angle: i32,
) -> ExitCode {
    let mut series = AngleSeries::new();
    match capture_at(camera, filter, angle, &config.acquisition, &mut series) {
        Ok(m) => match m.score() {
            Some(score) => println!("{angle},{score}"),
            None => println!("{angle},saturated"),
        },
        Err(e) => {
            error!(error = %e, angle, "capture failed");
            return ExitCode::FAILURE;
        }
    }
    if let Some(path) = &config.acquisition.results_csv {
        if let Err(e) = series.append_csv(path) {
            error!(error = %e, "failed to append CSV results");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn sweep(
    config: &Config,
    camera: &mut StillCommandCamera,
    filter: &dyn FrameFilter,
    plan: &SweepPlan,
) -> ExitCode {
    let stage = ManualStage::new(
        std::io::stdin().lock(),
        std::io::stderr(),
        config.stage.steps_per_degree,
    );
    let mut session = match StageSession::open(stage, &config.stage) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open stage");
            return ExitCode::FAILURE;
        }
    };

    let mut series = AngleSeries::new();
    let result = run_sweep(
        &mut session,
        camera,
        filter,
        plan,
        &config.acquisition,
        &mut series,
    );
    if let Err(e) = session.close() {
        warn!(error = %e, "failed to release stage");
    }

    // Whatever was measured before a failure is still exported.
    let mut failed = false;
    if let Err(e) = &result {
        error!(error = %e, recorded = series.len(), "sweep aborted");
        failed = true;
    }
    for sample in series.samples() {
        println!("{},{}", sample.angle, sample.intensity);
    }
    if let Err(e) = export_series(&series, &config.acquisition) {
        error!(error = %e, "failed to export results");
        failed = true;
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: &str) -> Config {
        let mut config = Config::default();
        config.acquisition.mode = mode.to_string();
        config
    }

    #[test]
    fn capture_needs_an_integer_angle() {
        let c = config("capture");
        assert!(matches!(select_mode(&c, None), Err(ModeError::MissingAngle)));
        assert!(matches!(
            select_mode(&c, Some("ten".into())),
            Err(ModeError::MissingAngle)
        ));
        assert!(matches!(
            select_mode(&c, Some("-15".into())),
            Ok(Mode::Capture(-15))
        ));
    }

    #[test]
    fn sweep_plan_is_validated_up_front() {
        let mut c = config("sweep");
        assert!(matches!(select_mode(&c, None), Ok(Mode::Sweep(_))));
        c.sweep.step_angle = i32::MAX;
        c.stage.steps_per_degree = 100;
        assert!(matches!(select_mode(&c, None), Err(ModeError::Plan(_))));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(matches!(select_mode(&config("single"), None), Ok(Mode::Single)));
        assert!(matches!(
            select_mode(&config("video"), None),
            Err(ModeError::Unknown(m)) if m == "video"
        ));
    }
}
