use image::imageops::{self, FilterType};
use image::RgbImage;

pub const DEFAULT_MAX_WIDTH: u32 = 800;
pub const DEFAULT_MAX_HEIGHT: u32 = 600;

/// Bounding display size for previews.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for DisplayLimits {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

/// Target preview size for a `width` x `height` image.
///
/// Width is corrected first, then height, each step keeping the original
/// aspect ratio.
pub fn fit_dimensions(width: u32, height: u32, limits: DisplayLimits) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let aspect = width as f64 / height as f64;
    let (mut w, mut h) = (width, height);

    if w > limits.max_width {
        w = limits.max_width;
        h = (w as f64 / aspect).round() as u32;
    }
    if h > limits.max_height {
        h = limits.max_height;
        w = (aspect * h as f64).round() as u32;
    }

    (w.max(1), h.max(1))
}

/// Resized copy of `img` that fits the display limits.
pub fn resize_for_display(img: &RgbImage, limits: DisplayLimits) -> RgbImage {
    let (w, h) = fit_dimensions(img.width(), img.height(), limits);
    if (w, h) == img.dimensions() {
        return img.clone();
    }
    imageops::resize(img, w, h, FilterType::Triangle)
}
