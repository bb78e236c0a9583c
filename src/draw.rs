use image::{Rgb, RgbImage};

use crate::boxes::BoundingBox;

pub const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const OUTLINE_THICKNESS: u32 = 2;

/// Draw the outline of `bbox` onto `img`. Parts outside the image are clipped.
pub fn draw_box(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let (x0, y0) = (bbox.xmin as f32, bbox.ymin as f32);
    let (x1, y1) = (bbox.xmax as f32, bbox.ymax as f32);
    draw_line(img, x0, y0, x1, y0, thickness, color);
    draw_line(img, x1, y0, x1, y1, thickness, color);
    draw_line(img, x1, y1, x0, y1, thickness, color);
    draw_line(img, x0, y1, x0, y0, thickness, color);
}

fn draw_line(
    img: &mut RgbImage,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    thickness: u32,
    color: Rgb<u8>,
) {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let len = (dx * dx + dy * dy).sqrt();
    let steps = (len * 2.0) as i32;
    let t = thickness.max(1) as i32;
    let (lo, hi) = (-(t / 2), t - t / 2);
    let (w, h) = (img.width() as i32, img.height() as i32);

    for i in 0..=steps {
        let s = i as f32 / steps.max(1) as f32;
        let cx = (x0 + dx * s).round() as i32;
        let cy = (y0 + dy * s).round() as i32;
        for oy in lo..hi {
            for ox in lo..hi {
                let px = cx + ox;
                let py = cy + oy;
                if px >= 0 && px < w && py >= 0 && py < h {
                    img.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }
}
