use ab_glyph::{FontVec, PxScale};
use goniolab_common::frame::Frame;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use super::saturation::SaturationVerdict;

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 200, 0]);
const LINE_WIDTH: i32 = 3;
const MARKER_SIZE: u32 = 24;
const LABEL_SCALE: f32 = 28.0;

/// Diagnostic copy of `frame` with every blob circle outlined and a
/// status marker in the top-left corner (red = saturated, green = usable).
pub fn annotate(frame: &Frame, verdict: &SaturationVerdict) -> RgbImage {
    let mut canvas = frame.to_rgb();

    for circle in &verdict.circles {
        let center = (circle.x.round() as i32, circle.y.round() as i32);
        let radius = circle.radius.round() as i32;
        for w in 0..LINE_WIDTH {
            draw_hollow_circle_mut(&mut canvas, center, radius + w, RED);
        }
    }

    let marker = if verdict.saturated { RED } else { GREEN };
    let (w, h) = (
        canvas.width().min(MARKER_SIZE),
        canvas.height().min(MARKER_SIZE),
    );
    if w > 0 && h > 0 {
        draw_filled_rect_mut(&mut canvas, Rect::at(0, 0).of_size(w, h), marker);
    }
    canvas
}

/// Caption for an annotated frame: the angle, or `SATURATED`.
pub fn status_label(angle: i32, verdict: &SaturationVerdict) -> String {
    if verdict.saturated {
        "SATURATED".to_string()
    } else {
        format!("{angle} deg")
    }
}

/// [`annotate`] plus `label` written in red to the right of the marker.
pub fn annotate_labeled(
    frame: &Frame,
    verdict: &SaturationVerdict,
    font: &FontVec,
    label: &str,
) -> RgbImage {
    let mut canvas = annotate(frame, verdict);
    let x = MARKER_SIZE as i32 + 8;
    draw_text_mut(&mut canvas, RED, x, 0, PxScale::from(LABEL_SCALE), font, label);
    canvas
}

/// Load a TrueType/OpenType font for frame labels.
pub fn load_font(path: &Path) -> Result<FontVec, AnnotateError> {
    let data =
        std::fs::read(path).map_err(|e| AnnotateError::Read(path.display().to_string(), e))?;
    FontVec::try_from_vec(data).map_err(|_| AnnotateError::InvalidFont(path.display().to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error("failed to read font {0}: {1}")]
    Read(String, std::io::Error),
    #[error("{0} is not a usable font")]
    InvalidFont(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::circle::BlobCircle;
    use image::{GrayImage, Luma};

    fn verdict(saturated: bool, circles: Vec<BlobCircle>) -> SaturationVerdict {
        SaturationVerdict {
            saturated,
            circles,
            saturated_fraction: 0.0,
        }
    }

    #[test]
    fn outlines_circles_and_marks_status() {
        let frame = Frame::from_gray(GrayImage::from_pixel(200, 200, Luma([40]))).unwrap();
        let circles = vec![BlobCircle {
            x: 100.0,
            y: 100.0,
            radius: 50.0,
        }];
        let out = annotate(&frame, &verdict(true, circles));
        assert_eq!(out.dimensions(), (200, 200));
        assert_eq!(*out.get_pixel(150, 100), RED);
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(100, 100), Rgb([40, 40, 40]));
    }

    #[test]
    fn label_names_angle_or_saturation() {
        assert_eq!(status_label(-15, &verdict(false, vec![])), "-15 deg");
        assert_eq!(status_label(30, &verdict(true, vec![])), "SATURATED");
    }

    #[test]
    fn font_errors() {
        let err = load_font(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, AnnotateError::Read(..)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(load_font(&path), Err(AnnotateError::InvalidFont(_))));
    }

    #[test]
    fn label_is_drawn_with_system_font() {
        // Skipped on hosts without DejaVu installed.
        let path = Path::new("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf");
        if !path.is_file() {
            return;
        }
        let font = load_font(path).unwrap();
        let frame = Frame::from_gray(GrayImage::new(300, 60)).unwrap();
        let plain = annotate(&frame, &verdict(true, vec![]));
        let labeled = annotate_labeled(&frame, &verdict(true, vec![]), &font, "SATURATED");
        assert_eq!(plain.dimensions(), labeled.dimensions());
        let changed = plain
            .pixels()
            .zip(labeled.pixels())
            .filter(|(a, b)| a != b)
            .count();
        assert!(changed > 50, "{changed}");
        // Text stays clear of the status marker.
        assert_eq!(*labeled.get_pixel(0, 0), RED);
        assert_eq!(*labeled.get_pixel(MARKER_SIZE + 2, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn usable_frame_gets_green_marker() {
        let frame = Frame::from_gray(GrayImage::from_pixel(10, 8, Luma([0]))).unwrap();
        let out = annotate(&frame, &verdict(false, vec![]));
        assert_eq!(*out.get_pixel(9, 7), GREEN);
    }
}
