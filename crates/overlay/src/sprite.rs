//! Sprite helpers

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};

/// Resize a reference-size sprite by `scale`, never below one pixel
pub fn scaled(sprite: &RgbaImage, scale: f32) -> RgbaImage {
    let width = ((sprite.width() as f32 * scale) as u32).max(1);
    let height = ((sprite.height() as f32 * scale) as u32).max(1);
    imageops::resize(sprite, width, height, FilterType::Triangle)
}

/// Alpha-blend `sprite` onto `canvas` with its top-left corner at (x, y)
pub fn blit(canvas: &mut RgbImage, sprite: &RgbaImage, x: i32, y: i32) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);

    for (sx, sy, pixel) in sprite.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        if alpha == 0 {
            continue;
        }
        let (px, py) = (x as i64 + sx as i64, y as i64 + sy as i64);
        if px < 0 || py < 0 || px >= cw || py >= ch {
            continue;
        }

        let target = canvas.get_pixel_mut(px as u32, py as u32);
        let blend = |src: u8, dst: u8| ((src as u32 * alpha + dst as u32 * (255 - alpha)) / 255) as u8;
        *target = Rgb([
            blend(pixel[0], target[0]),
            blend(pixel[1], target[1]),
            blend(pixel[2], target[2]),
        ]);
    }
}
