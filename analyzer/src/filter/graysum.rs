use goniolab_common::config::FilterConfig;
use goniolab_common::frame::Frame;
use image::GrayImage;
use tracing::debug;

use super::saturation::detect_saturation;
use super::traits::{FrameFilter, Measurement};

/// Sum of all grayscale sample values.
pub fn gray_sum(frame: &Frame) -> u64 {
    sum_samples(&frame.gray())
}

fn sum_samples(gray: &GrayImage) -> u64 {
    gray.pixels().map(|p| p.0[0] as u64).sum()
}

/// Scores frames by their total gray level instead of mean lightness.
///
/// Unlike the lightness average this grows with the lit area, so it is
/// only comparable between frames of the same resolution.
pub struct GraySumFilter {
    config: FilterConfig,
}

impl GraySumFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }
}

impl FrameFilter for GraySumFilter {
    fn evaluate(&self, frame: &Frame) -> Measurement {
        let gray = frame.gray();
        let verdict = detect_saturation(&gray, &self.config);
        Measurement::gate(verdict, || {
            let sum = sum_samples(&gray);
            debug!(sum, "gray sum");
            sum as f64
        })
    }

    fn name(&self) -> &str {
        "gray_sum"
    }
}
