use goniolab_common::config::FilterConfig;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use serde::Serialize;
use tracing::debug;

use super::circle::{min_enclosing_circle, BlobCircle};

/// Outcome of the overexposure check for one frame, with the evidence
/// it was decided on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaturationVerdict {
    pub saturated: bool,
    /// One enclosing circle per outer blob of near-maximal pixels.
    pub circles: Vec<BlobCircle>,
    /// Share of 255-valued pixels among all non-black pixels.
    pub saturated_fraction: f64,
}

impl SaturationVerdict {
    pub fn blob_count(&self) -> usize {
        self.circles.len()
    }

    pub fn radii(&self) -> Vec<f64> {
        self.circles.iter().map(|c| c.radius).collect()
    }

    pub fn max_radius(&self) -> Option<f64> {
        self.circles.iter().map(|c| c.radius).reduce(f64::max)
    }
}

/// Classify a grayscale frame as clipped or not.
///
/// A frame is saturated only when both hold: some blob of near-maximal
/// pixels survives the erode/dilate pass with an enclosing radius above
/// `min_blob_radius`, and more than `saturated_fraction_threshold` of the
/// non-black pixels sit at 255.
pub fn detect_saturation(gray: &GrayImage, config: &FilterConfig) -> SaturationVerdict {
    let circles = saturated_blobs(gray, config);
    let (saturated_pixels, saturated_fraction) = saturated_fraction(gray);

    let max_radius = circles.iter().map(|c| c.radius).reduce(f64::max);
    let saturated = max_radius.is_some_and(|r| r > config.min_blob_radius)
        && saturated_pixels > 0
        && saturated_fraction > config.saturated_fraction_threshold;

    debug!(
        blobs = circles.len(),
        max_radius = format!("{:.1}", max_radius.unwrap_or(0.0)),
        saturated_pixels,
        saturated_fraction = format!("{:.4}", saturated_fraction),
        saturated,
        "saturation check"
    );

    SaturationVerdict {
        saturated,
        circles,
        saturated_fraction,
    }
}

/// Enclosing circles of the bright clusters left after thresholding and
/// noise removal. Only outermost borders count; holes and nested blobs
/// are ignored. Blobs touching the image border, including one that
/// fills the whole frame, are traced like any other.
pub fn saturated_blobs(gray: &GrayImage, config: &FilterConfig) -> Vec<BlobCircle> {
    // Pixels above the cutoff become 255, everything else 0.
    let mut mask = threshold(gray, config.saturation_cutoff, ThresholdType::Binary);
    // A 3x3 kernel applied n times reaches n pixels in chessboard distance.
    if config.erode_iterations > 0 {
        mask = erode(&mask, Norm::LInf, config.erode_iterations);
    }
    if config.dilate_iterations > 0 {
        mask = dilate(&mask, Norm::LInf, config.dilate_iterations);
    }

    find_contours::<i32>(&framed(&mask))
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|c| {
            let points: Vec<(f64, f64)> = c
                .points
                .iter()
                .map(|p| ((p.x - 1) as f64, (p.y - 1) as f64))
                .collect();
            min_enclosing_circle(&points)
        })
        .collect()
}

// Copy of `mask` inside a one-pixel black frame. Contour tracing needs
// background around every blob; callers shift points back by one.
fn framed(mask: &GrayImage) -> GrayImage {
    let mut out = GrayImage::new(mask.width() + 2, mask.height() + 2);
    image::imageops::replace(&mut out, mask, 1, 1);
    out
}

/// Count of 255-valued pixels and their share of the non-black pixels.
/// A frame with no non-black pixel has share 0.
pub fn saturated_fraction(gray: &GrayImage) -> (u64, f64) {
    let (mut saturated, mut lit) = (0u64, 0u64);
    for p in gray.pixels() {
        match p.0[0] {
            0 => {}
            255 => {
                saturated += 1;
                lit += 1;
            }
            _ => lit += 1,
        }
    }
    if lit == 0 {
        return (0, 0.0);
    }
    (saturated, saturated as f64 / lit as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    fn disk(size: u32, background: u8, radius: i32) -> GrayImage {
        let mut img = GrayImage::from_pixel(size, size, Luma([background]));
        let c = size as i32 / 2;
        draw_filled_circle_mut(&mut img, (c, c), radius, Luma([255]));
        img
    }

    #[test]
    fn large_clipped_disk_is_saturated() {
        let verdict = detect_saturation(&disk(400, 0, 100), &FilterConfig::default());
        assert!(verdict.saturated);
        assert_eq!(verdict.blob_count(), 1);
        assert!(verdict.max_radius().unwrap() > 90.0);
        assert_eq!(verdict.saturated_fraction, 1.0);
    }

    #[test]
    fn small_clipped_disk_is_not_saturated() {
        let verdict = detect_saturation(&disk(400, 0, 10), &FilterConfig::default());
        assert!(!verdict.saturated);
        assert_eq!(verdict.blob_count(), 1);
        assert!(verdict.max_radius().unwrap() < 90.0);
        // The pixel-fraction condition alone holds.
        assert_eq!(verdict.saturated_fraction, 1.0);
    }

    #[test]
    fn large_disk_on_lit_background_is_not_saturated() {
        let verdict = detect_saturation(&disk(400, 128, 120), &FilterConfig::default());
        assert!(verdict.max_radius().unwrap() > 90.0);
        assert!(verdict.saturated_fraction < 0.95);
        assert!(!verdict.saturated);
    }

    #[test]
    fn all_black_frame() {
        let verdict = detect_saturation(&GrayImage::new(64, 48), &FilterConfig::default());
        assert!(!verdict.saturated);
        assert!(verdict.circles.is_empty());
        assert_eq!(verdict.saturated_fraction, 0.0);
        assert_eq!(verdict.max_radius(), None);
    }

    #[test]
    fn mid_gray_frame_has_no_blobs() {
        let gray = GrayImage::from_pixel(64, 48, Luma([128]));
        let verdict = detect_saturation(&gray, &FilterConfig::default());
        assert!(!verdict.saturated);
        assert!(verdict.circles.is_empty());
        assert_eq!(verdict.saturated_fraction, 0.0);
    }

    #[test]
    fn isolated_hot_pixels_are_eroded_away() {
        let mut gray = GrayImage::new(100, 100);
        for (x, y) in [(10, 10), (50, 20), (70, 80), (71, 80)] {
            gray.put_pixel(x, y, Luma([255]));
        }
        let blobs = saturated_blobs(&gray, &FilterConfig::default());
        assert!(blobs.is_empty());
    }

    #[test]
    fn near_max_pixels_are_thresholded_out() {
        let mut gray = GrayImage::new(200, 200);
        draw_filled_circle_mut(&mut gray, (100, 100), 50, Luma([254]));
        assert!(saturated_blobs(&gray, &FilterConfig::default()).is_empty());
    }

    #[test]
    fn separate_blobs_get_separate_circles() {
        let mut gray = GrayImage::new(300, 200);
        draw_filled_circle_mut(&mut gray, (60, 100), 30, Luma([255]));
        draw_filled_circle_mut(&mut gray, (220, 100), 40, Luma([255]));
        let verdict = detect_saturation(&gray, &FilterConfig::default());
        assert_eq!(verdict.blob_count(), 2);
        let mut radii = verdict.radii();
        radii.sort_by(f64::total_cmp);
        assert!(radii[0] > 28.0 && radii[0] < 36.0, "{radii:?}");
        assert!(radii[1] > 38.0 && radii[1] < 46.0, "{radii:?}");
        assert!(!verdict.saturated);
    }

    #[test]
    fn holes_do_not_produce_circles() {
        let mut gray = disk(400, 0, 120);
        draw_filled_circle_mut(&mut gray, (200, 200), 60, Luma([0]));
        let verdict = detect_saturation(&gray, &FilterConfig::default());
        assert_eq!(verdict.blob_count(), 1);
        assert!(verdict.saturated);
    }

    #[test]
    fn radius_threshold_is_configurable() {
        let config = FilterConfig {
            min_blob_radius: 5.0,
            ..FilterConfig::default()
        };
        assert!(detect_saturation(&disk(100, 0, 10), &config).saturated);
    }

    #[test]
    fn fully_clipped_frame_is_saturated() {
        let gray = GrayImage::from_pixel(200, 150, Luma([255]));
        let verdict = detect_saturation(&gray, &FilterConfig::default());
        assert!(verdict.saturated);
        assert_eq!(verdict.blob_count(), 1);
        let c = verdict.circles[0];
        assert!((c.x - 99.5).abs() < 1e-6 && (c.y - 74.5).abs() < 1e-6, "{c:?}");
        assert!((c.radius - 124.5).abs() < 1.0, "{c:?}");
        assert_eq!(verdict.saturated_fraction, 1.0);
    }

    #[test]
    fn blob_on_left_edge_matches_right_edge() {
        let mut left = GrayImage::new(400, 300);
        draw_filled_rect_mut(&mut left, Rect::at(0, 50).of_size(200, 200), Luma([255]));
        let mut right = GrayImage::new(400, 300);
        draw_filled_rect_mut(&mut right, Rect::at(200, 50).of_size(200, 200), Luma([255]));

        let config = FilterConfig::default();
        let l = detect_saturation(&left, &config);
        let r = detect_saturation(&right, &config);
        assert!(l.saturated, "{l:?}");
        assert!(r.saturated, "{r:?}");
        assert_eq!(l.blob_count(), 1);
        assert_eq!(r.blob_count(), 1);
        assert!((l.circles[0].radius - r.circles[0].radius).abs() < 1e-6);
        assert!((l.circles[0].radius - 100.0 * 2f64.sqrt()).abs() < 2.0);
        assert!(l.circles[0].x < 150.0 && r.circles[0].x > 250.0);
    }

    #[test]
    fn blob_in_corner_is_traced() {
        let mut gray = GrayImage::new(300, 300);
        draw_filled_rect_mut(&mut gray, Rect::at(0, 0).of_size(150, 150), Luma([255]));
        let blobs = saturated_blobs(&gray, &FilterConfig::default());
        assert_eq!(blobs.len(), 1);
        assert!(blobs[0].radius > 90.0);
    }

    #[test]
    fn fraction_ignores_black_background() {
        let mut gray = GrayImage::new(10, 10);
        gray.put_pixel(0, 0, Luma([255]));
        gray.put_pixel(1, 0, Luma([255]));
        gray.put_pixel(2, 0, Luma([255]));
        gray.put_pixel(3, 0, Luma([40]));
        let (count, fraction) = saturated_fraction(&gray);
        assert_eq!(count, 3);
        assert_eq!(fraction, 0.75);
    }
}
