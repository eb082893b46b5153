//! Bitmap text
//!
//! 5x7 dot glyphs for the characters overlay labels use, scaled by an
//! integer cell size and drawn with a one-pixel drop shadow.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SPACING: u32 = 1;

const SHADOW: Rgb<u8> = Rgb([64, 64, 64]);

/// Rows top to bottom, bit 4 is the leftmost column
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        'º' | '°' => [0x0C, 0x12, 0x12, 0x0C, 0x00, 0x00, 0x00],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        'f' => [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
        'g' => [0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        'h' => [0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11],
        'k' => [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
        'm' => [0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
        'p' => [0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10],
        't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        ' ' => [0x00; 7],
        _ => return None,
    };
    Some(rows)
}

/// Draws label text at a fixed height
#[derive(Debug, Clone)]
pub struct TextRenderer {
    cell: u32,
    color: Rgb<u8>,
}

impl TextRenderer {
    /// `text_height` in pixels; rounded to a whole number of dots, at least one
    pub fn new(text_height: f32, color: Rgb<u8>) -> Self {
        let cell = (text_height / GLYPH_HEIGHT as f32).round().max(1.0) as u32;
        Self { cell, color }
    }

    pub fn height(&self) -> u32 {
        GLYPH_HEIGHT * self.cell
    }

    pub fn width(&self, text: &str) -> u32 {
        let count = text.chars().count() as u32;
        if count == 0 {
            return 0;
        }
        (count * (GLYPH_WIDTH + GLYPH_SPACING) - GLYPH_SPACING) * self.cell
    }

    /// Draw `text` with its baseline at `baseline`, clipped to the canvas
    pub fn draw(&self, canvas: &mut RgbImage, x: i32, baseline: i32, text: &str) {
        self.draw_pass(canvas, x, baseline + 1, text, SHADOW);
        self.draw_pass(canvas, x, baseline, text, self.color);
    }

    fn draw_pass(&self, canvas: &mut RgbImage, x: i32, baseline: i32, text: &str, color: Rgb<u8>) {
        let cell = self.cell as i32;
        let top = baseline - self.height() as i32;
        let advance = ((GLYPH_WIDTH + GLYPH_SPACING) * self.cell) as i32;

        for (i, c) in text.chars().enumerate() {
            let Some(rows) = glyph(c) else {
                continue;
            };
            let left = x + i as i32 * advance;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (0x10 >> col) != 0 {
                        let rect = Rect::at(left + col as i32 * cell, top + row as i32 * cell).of_size(self.cell, self.cell);
                        draw_filled_rect_mut(canvas, rect, color);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    #[test]
    fn test_cell_size_follows_height() {
        assert_eq!(TextRenderer::new(30.0, WHITE).height(), 28);
        assert_eq!(TextRenderer::new(0.5, WHITE).height(), 7);
        assert_eq!(TextRenderer::new(7.0, WHITE).width("km/h"), 23);
        assert_eq!(TextRenderer::new(7.0, WHITE).width(""), 0);
    }

    #[test]
    fn test_glyph_dots_and_shadow() {
        let text = TextRenderer::new(7.0, WHITE);
        let mut canvas = RgbImage::new(20, 20);
        text.draw(&mut canvas, 2, 10, "8");

        // Top row of '8' is .###.
        assert_eq!(*canvas.get_pixel(2, 3), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(3, 3), WHITE);
        // Bottom row, shadow one pixel below
        assert_eq!(*canvas.get_pixel(3, 9), WHITE);
        assert_eq!(*canvas.get_pixel(3, 10), SHADOW);
    }

    #[test]
    fn test_drawing_off_canvas_is_clipped() {
        let text = TextRenderer::new(30.0, WHITE);
        let mut canvas = RgbImage::new(10, 10);
        text.draw(&mut canvas, -50, 500, "123");
        text.draw(&mut canvas, 5, 5, "km/h");
    }
}
