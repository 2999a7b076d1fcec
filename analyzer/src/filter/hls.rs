use goniolab_common::frame::{Frame, FramePixels};

/// HLS lightness of an 8-bit RGB sample: the midpoint of the largest and
/// smallest channel, rounded half-to-even.
pub fn lightness(rgb: [u8; 3]) -> u8 {
    let max = rgb.iter().copied().max().unwrap_or(0) as f32;
    let min = rgb.iter().copied().min().unwrap_or(0) as f32;
    ((max + min) / 2.0).round_ties_even() as u8
}

/// Average HLS lightness over the pixels whose lightness is non-zero.
///
/// Gray samples map to lightness unchanged. A frame with no lit pixel
/// scores 0.
pub fn mean_lightness(frame: &Frame) -> f64 {
    let (sum, count) = match frame.pixels() {
        FramePixels::Gray(img) => img
            .pixels()
            .map(|p| p.0[0])
            .filter(|&l| l != 0)
            .fold((0u64, 0u64), |(s, n), l| (s + l as u64, n + 1)),
        FramePixels::Color(img) => img
            .pixels()
            .map(|p| lightness(p.0))
            .filter(|&l| l != 0)
            .fold((0u64, 0u64), |(s, n), l| (s + l as u64, n + 1)),
    };
    if count == 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}
