use goniolab_analyzer::filter::build_filter;
use goniolab_analyzer::folder::analyze_folder;
use goniolab_analyzer::series::AngleSeries;
use goniolab_common::config::Config;
use std::path::PathBuf;
use tracing::{error, info};

/// Usage: goniolab-analyze <image-folder> [config.toml]
fn main() {
    let Some(folder) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: goniolab-analyze <image-folder> [config.toml]");
        std::process::exit(2);
    };

    let config = match std::env::args().nth(2).map(PathBuf::from) {
        Some(path) => match Config::load(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        folder = folder.display().to_string(),
        scorer = config.filter.scorer,
        cutoff = config.filter.saturation_cutoff,
        min_blob_radius = config.filter.min_blob_radius,
        fraction_threshold = config.filter.saturated_fraction_threshold,
        "starting goniolab folder analysis"
    );

    let filter = match build_filter(&config.filter) {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "invalid filter configuration");
            std::process::exit(1);
        }
    };

    let mut series = AngleSeries::new();
    if let Err(e) = analyze_folder(&folder, filter.as_ref(), &mut series) {
        error!(error = %e, "folder analysis failed");
        std::process::exit(1);
    }

    for sample in series.samples() {
        println!("{},{}", sample.angle, sample.intensity);
    }

    if let Some(path) = &config.acquisition.results_csv {
        if let Err(e) = series.write_csv(path) {
            error!(error = %e, "failed to export CSV");
            std::process::exit(1);
        }
    }
    if let Some(path) = &config.acquisition.results_json {
        if let Err(e) = series.write_json(path) {
            error!(error = %e, "failed to export JSON");
            std::process::exit(1);
        }
    }
}
