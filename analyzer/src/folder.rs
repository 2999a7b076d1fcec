use goniolab_common::frame::{Frame, TaggedFrame};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::filter::FrameFilter;
use crate::keys::angle_from_file_name;
use crate::series::AngleSeries;

/// Tally of one folder pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FolderReport {
    pub scored: usize,
    pub saturated: usize,
    /// Files without an angle label or that failed to decode.
    pub skipped: usize,
}

/// Score every labelled image in `dir` into `series`, in file-name order.
pub fn analyze_folder(
    dir: &Path,
    filter: &dyn FrameFilter,
    series: &mut AngleSeries,
) -> Result<FolderReport, FolderError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| FolderError::ReadDir(dir.display().to_string(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    info!(
        dir = dir.display().to_string(),
        files = paths.len(),
        filter = filter.name(),
        "analyzing folder"
    );

    let mut report = FolderReport::default();
    for path in paths {
        let Some(tagged) = load_tagged(&path) else {
            report.skipped += 1;
            continue;
        };

        let measurement = filter.evaluate(&tagged.frame);
        if series.record(tagged.angle, &measurement) {
            report.scored += 1;
        } else {
            warn!(file = path.display().to_string(), "image is saturated");
            report.saturated += 1;
        }
    }

    info!(
        scored = report.scored,
        saturated = report.saturated,
        skipped = report.skipped,
        "folder analysis complete"
    );
    Ok(report)
}

fn load_tagged(path: &Path) -> Option<TaggedFrame> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let Some(angle) = angle_from_file_name(name) else {
        debug!(file = name, "no angle in file name, skipping");
        return None;
    };
    match Frame::open_gray(path) {
        Ok(frame) => Some(TaggedFrame { angle, frame }),
        Err(e) => {
            warn!(file = name, error = %e, "failed to load image, skipping");
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FolderError {
    #[error("failed to list folder {0}: {1}")]
    ReadDir(String, std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ImageFilter;
    use goniolab_common::config::FilterConfig;
    use image::{GrayImage, Luma};
    use imageproc::drawing::draw_filled_circle_mut;

    #[test]
    fn scores_labelled_images_and_skips_the_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        GrayImage::from_pixel(40, 30, Luma([60]))
            .save(dir.join("10.png"))
            .unwrap();
        GrayImage::from_pixel(40, 30, Luma([90]))
            .save(dir.join("5.png"))
            .unwrap();
        let mut clipped = GrayImage::new(300, 300);
        draw_filled_circle_mut(&mut clipped, (150, 150), 110, Luma([255]));
        clipped.save(dir.join("20.png")).unwrap();
        GrayImage::from_pixel(4, 4, Luma([1]))
            .save(dir.join("notes.png"))
            .unwrap();
        std::fs::write(dir.join("30.png"), b"not an image").unwrap();

        let filter = ImageFilter::new(FilterConfig::default());
        let mut series = AngleSeries::new();
        let report = analyze_folder(dir, &filter, &mut series).unwrap();

        assert_eq!(
            report,
            FolderReport {
                scored: 2,
                saturated: 1,
                skipped: 2
            }
        );
        // File-name order: "10.png" sorts before "5.png".
        let points: Vec<(i32, f64)> = series
            .samples()
            .iter()
            .map(|s| (s.angle, s.intensity))
            .collect();
        assert_eq!(points, vec![(10, 60.0), (5, 90.0)]);
        assert_eq!(series.rejected(), &[20]);
    }

    #[test]
    fn negative_angles_keep_their_sign() {
        let tmp = tempfile::tempdir().unwrap();
        for (angle, level) in [(-15, 40u8), (15, 80)] {
            GrayImage::from_pixel(8, 8, Luma([level]))
                .save(tmp.path().join(format!("{angle}.png")))
                .unwrap();
        }

        let filter = ImageFilter::new(FilterConfig::default());
        let mut series = AngleSeries::new();
        analyze_folder(tmp.path(), &filter, &mut series).unwrap();
        let points: Vec<(i32, f64)> = series
            .samples()
            .iter()
            .map(|s| (s.angle, s.intensity))
            .collect();
        assert_eq!(points, vec![(-15, 40.0), (15, 80.0)]);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let filter = ImageFilter::new(FilterConfig::default());
        let mut series = AngleSeries::new();
        let err = analyze_folder(Path::new("/nonexistent/goniolab"), &filter, &mut series)
            .unwrap_err();
        assert!(matches!(err, FolderError::ReadDir(..)));
    }
}
