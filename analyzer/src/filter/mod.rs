pub mod annotate;
pub mod circle;
pub mod graysum;
pub mod hls;
pub mod saturation;
pub mod traits;

use goniolab_common::config::FilterConfig;
use goniolab_common::frame::Frame;
use tracing::debug;

pub use annotate::{annotate, annotate_labeled, load_font, status_label, AnnotateError};
pub use circle::BlobCircle;
pub use graysum::GraySumFilter;
pub use saturation::SaturationVerdict;
pub use traits::{FrameFilter, Measurement};

/// Saturation gate plus HLS-lightness scoring.
///
/// Holds nothing but its thresholds: every call is a pure function of the
/// frame, so the same frame always yields the same verdict and score.
#[derive(Debug, Clone)]
pub struct ImageFilter {
    config: FilterConfig,
}

impl ImageFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Full saturation verdict with blob circles and pixel fraction.
    pub fn saturation(&self, frame: &Frame) -> SaturationVerdict {
        saturation::detect_saturation(&frame.gray(), &self.config)
    }

    pub fn is_saturated(&self, frame: &Frame) -> bool {
        self.saturation(frame).saturated
    }

    /// Mean HLS lightness of the non-black pixels; 0 for an all-black frame.
    pub fn score_intensity(&self, frame: &Frame) -> f64 {
        hls::mean_lightness(frame)
    }

    pub fn sum_intensity(&self, frame: &Frame) -> u64 {
        graysum::gray_sum(frame)
    }

    pub fn measure(&self, frame: &Frame) -> Measurement {
        let verdict = self.saturation(frame);
        Measurement::gate(verdict, || {
            let score = self.score_intensity(frame);
            debug!(score = format!("{:.3}", score), "HLS lightness");
            score
        })
    }
}

impl FrameFilter for ImageFilter {
    fn evaluate(&self, frame: &Frame) -> Measurement {
        self.measure(frame)
    }

    fn name(&self) -> &str {
        "hls_lightness"
    }
}

/// Build the scorer named by `config.scorer`.
pub fn build_filter(config: &FilterConfig) -> Result<Box<dyn FrameFilter>, FilterError> {
    match config.scorer.as_str() {
        "hls_lightness" => Ok(Box::new(ImageFilter::new(config.clone()))),
        "gray_sum" => Ok(Box::new(GraySumFilter::new(config.clone()))),
        other => Err(FilterError::UnknownScorer(other.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("unknown scorer '{0}', expected 'hls_lightness' or 'gray_sum'")]
    UnknownScorer(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use goniolab_common::frame::FrameError;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use imageproc::drawing::draw_filled_circle_mut;

    fn filter() -> ImageFilter {
        ImageFilter::new(FilterConfig::default())
    }

    fn disk_frame(radius: i32) -> Frame {
        let mut img = GrayImage::new(480, 360);
        draw_filled_circle_mut(&mut img, (240, 180), radius, Luma([255]));
        Frame::from_gray(img).unwrap()
    }

    #[test]
    fn mid_gray_frame() {
        let frame = Frame::from_gray(GrayImage::from_pixel(160, 120, Luma([128]))).unwrap();
        assert!(!filter().is_saturated(&frame));
        let score = filter().score_intensity(&frame);
        assert!(score.is_finite());
        assert_eq!(score, 128.0);
    }

    #[test]
    fn mid_gray_color_frame() {
        let frame = Frame::from_rgb(RgbImage::from_pixel(160, 120, Rgb([128, 128, 128]))).unwrap();
        assert!(!filter().is_saturated(&frame));
        assert_eq!(filter().score_intensity(&frame), 128.0);
    }

    #[test]
    fn radius_100_disk_is_saturated() {
        assert!(filter().is_saturated(&disk_frame(100)));
    }

    #[test]
    fn radius_10_disk_is_not_saturated() {
        let verdict = filter().saturation(&disk_frame(10));
        assert!(!verdict.saturated);
        assert!(verdict.saturated_fraction > 0.95);
    }

    #[test]
    fn all_zero_frame() {
        let frame = Frame::from_gray(GrayImage::new(64, 64)).unwrap();
        assert_eq!(filter().score_intensity(&frame), 0.0);
        assert!(!filter().is_saturated(&frame));
        assert_eq!(filter().measure(&frame).score(), Some(0.0));
    }

    #[test]
    fn scoring_is_idempotent() {
        let mut img = GrayImage::new(97, 61);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Luma([((x * 7 + y * 13) % 256) as u8]);
        }
        let frame = Frame::from_gray(img).unwrap();
        let f = filter();
        let first = f.score_intensity(&frame);
        let second = f.score_intensity(&frame);
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(f.measure(&frame), f.measure(&frame));
    }

    #[test]
    fn saturated_frame_is_not_scored() {
        let measurement = filter().measure(&disk_frame(100));
        assert!(measurement.is_saturated());
        assert_eq!(measurement.score(), None);
        assert!(measurement.verdict().saturated);
    }

    #[test]
    fn empty_image_is_rejected_before_measuring() {
        let err = Frame::from_gray(GrayImage::new(0, 0)).unwrap_err();
        assert!(matches!(err, FrameError::Empty { width: 0, height: 0 }));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn build_filter_by_name() {
        let mut config = FilterConfig::default();
        assert_eq!(build_filter(&config).unwrap().name(), "hls_lightness");
        config.scorer = "gray_sum".into();
        assert_eq!(build_filter(&config).unwrap().name(), "gray_sum");
        config.scorer = "median".into();
        assert!(matches!(
            build_filter(&config),
            Err(FilterError::UnknownScorer(name)) if name == "median"
        ));
    }

    #[test]
    fn sum_intensity_matches_gray_total() {
        let frame = Frame::from_gray(GrayImage::from_pixel(4, 4, Luma([10]))).unwrap();
        assert_eq!(filter().sum_intensity(&frame), 160);
    }
}
