use image::{DynamicImage, GrayImage, ImageReader, RgbImage};
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

/// A captured 8-bit frame, grayscale or 3-channel RGB.
///
/// Frames can only be built through the validating constructors below,
/// which reject empty images, unsupported channel counts and mismatched
/// buffer sizes. Every `Frame` therefore has at least one pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Pixels,
}

#[derive(Debug, Clone, PartialEq)]
enum Pixels {
    Gray(GrayImage),
    Color(RgbImage),
}

/// Borrowed view of a frame's samples in their stored layout.
#[derive(Debug, Clone, Copy)]
pub enum FramePixels<'a> {
    Gray(&'a GrayImage),
    Color(&'a RgbImage),
}

/// A frame tagged with the angle it was captured at.
#[derive(Debug, Clone)]
pub struct TaggedFrame {
    pub angle: i32,
    pub frame: Frame,
}

impl Frame {
    pub fn from_gray(img: GrayImage) -> Result<Self, FrameError> {
        check_size(img.width(), img.height())?;
        Ok(Self {
            pixels: Pixels::Gray(img),
        })
    }

    pub fn from_rgb(img: RgbImage) -> Result<Self, FrameError> {
        check_size(img.width(), img.height())?;
        Ok(Self {
            pixels: Pixels::Color(img),
        })
    }

    /// Build a frame from a raw interleaved sample buffer.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        check_size(width, height)?;
        let expected = width as usize * height as usize * channels as usize;
        match channels {
            1 | 3 if data.len() != expected => Err(FrameError::BufferSize {
                got: data.len(),
                expected,
            }),
            1 => GrayImage::from_raw(width, height, data)
                .ok_or(FrameError::BufferSize { got: 0, expected })
                .and_then(Self::from_gray),
            3 => RgbImage::from_raw(width, height, data)
                .ok_or(FrameError::BufferSize { got: 0, expected })
                .and_then(Self::from_rgb),
            other => Err(FrameError::UnsupportedChannels(other)),
        }
    }

    /// Wrap a decoded image. Only 8-bit gray and 8-bit RGB are accepted.
    pub fn from_dynamic(img: DynamicImage) -> Result<Self, FrameError> {
        check_size(img.width(), img.height())?;
        match img {
            DynamicImage::ImageLuma8(gray) => Self::from_gray(gray),
            DynamicImage::ImageRgb8(rgb) => Self::from_rgb(rgb),
            other => Err(FrameError::UnsupportedColor(format!("{:?}", other.color()))),
        }
    }

    /// Decode an image file and reduce it to grayscale.
    pub fn open_gray(path: &Path) -> Result<Self, FrameError> {
        let img = ImageReader::open(path)
            .map_err(|e| FrameError::Read(path.display().to_string(), e))?
            .with_guessed_format()
            .map_err(|e| FrameError::Read(path.display().to_string(), e))?
            .decode()
            .map_err(|e| FrameError::Decode(path.display().to_string(), e.to_string()))?;
        debug!(
            path = path.display().to_string(),
            width = img.width(),
            height = img.height(),
            color = format!("{:?}", img.color()),
            "image decoded"
        );
        Self::from_gray(img.to_luma8())
    }

    pub fn width(&self) -> u32 {
        match &self.pixels {
            Pixels::Gray(img) => img.width(),
            Pixels::Color(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match &self.pixels {
            Pixels::Gray(img) => img.height(),
            Pixels::Color(img) => img.height(),
        }
    }

    pub fn channels(&self) -> u8 {
        match self.pixels {
            Pixels::Gray(_) => 1,
            Pixels::Color(_) => 3,
        }
    }

    pub fn pixels(&self) -> FramePixels<'_> {
        match &self.pixels {
            Pixels::Gray(img) => FramePixels::Gray(img),
            Pixels::Color(img) => FramePixels::Color(img),
        }
    }

    /// Grayscale view of the frame; color frames are converted to luma.
    pub fn gray(&self) -> Cow<'_, GrayImage> {
        match &self.pixels {
            Pixels::Gray(img) => Cow::Borrowed(img),
            Pixels::Color(img) => Cow::Owned(image::imageops::grayscale(img)),
        }
    }

    /// RGB copy of the frame, used for annotated diagnostics.
    pub fn to_rgb(&self) -> RgbImage {
        match &self.pixels {
            Pixels::Gray(img) => DynamicImage::ImageLuma8(img.clone()).to_rgb8(),
            Pixels::Color(img) => img.clone(),
        }
    }
}

fn check_size(width: u32, height: u32) -> Result<(), FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::Empty { width, height });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("unsupported channel count {0}, expected 1 or 3")]
    UnsupportedChannels(u8),
    #[error("unsupported color type {0}, expected 8-bit gray or RGB")]
    UnsupportedColor(String),
    #[error("frame buffer has {got} bytes, expected {expected}")]
    BufferSize { got: usize, expected: usize },
    #[error("failed to read image {0}: {1}")]
    Read(String, std::io::Error),
    #[error("failed to decode image {0}: {1}")]
    Decode(String, String),
}
