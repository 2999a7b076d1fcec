use std::path::Path;

/// Recover the angle label from an image file name by joining every
/// digit of the file stem, e.g. `"45.png"` -> 45, `"angle_1_20.jpg"` -> 120.
/// A `-` right before the first digit makes the angle negative, so
/// `"-15.png"` and `"angle_-15.png"` both give -15.
///
/// Returns `None` when the stem has no digits or the value overflows.
pub fn angle_from_file_name(name: &str) -> Option<i32> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    let first = stem.find(|c: char| c.is_ascii_digit())?;
    let negative = stem[..first].ends_with('-');
    let mut label = String::with_capacity(stem.len() + 1);
    if negative {
        label.push('-');
    }
    label.extend(stem[first..].chars().filter(|c| c.is_ascii_digit()));
    label.parse().ok()
}

/// File name for a frame captured at `angle`, e.g. "45.png".
pub fn frame_file_name(angle: i32, ext: &str) -> String {
    format!("{angle}.{ext}")
}

/// File name for the overwritten single-shot capture, e.g. "img.png".
pub fn unlabeled_file_name(ext: &str) -> String {
    format!("img.{ext}")
}

/// Annotated diagnostics are always written as PNG.
pub fn annotated_file_name(angle: i32) -> String {
    format!("{angle}.png")
}
