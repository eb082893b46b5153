//! Speed gauge

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use std::f32::consts::PI;

use crate::sprite;

/// Number of gauge graphics between zero and the session maximum
pub const SPEED_BANDS: usize = 19;

const GAUGE_WIDTH: u32 = 190;
const GAUGE_HEIGHT: u32 = 100;
const OUTER_RADIUS: f32 = 88.0;
const INNER_RADIUS: f32 = 64.0;
const UNLIT: Rgba<u8> = Rgba([90, 90, 90, 150]);
/// Scale floor (m/s) for sessions without usable speed samples
const MIN_SCALE_SPEED: f32 = 1.0;

/// Arc gauge with one pre-rendered graphic per speed band
pub struct SpeedGauge {
    thresholds: [f32; SPEED_BANDS],
    sprites: Vec<RgbaImage>,
}

impl SpeedGauge {
    /// Bands split `0..max_speed` evenly; graphics are scaled by `scale`
    pub fn new(max_speed: f32, scale: f32, color: Rgba<u8>) -> Self {
        // NaN falls back to the floor as well
        let step = max_speed.max(MIN_SCALE_SPEED) / SPEED_BANDS as f32;
        let thresholds = std::array::from_fn(|i| i as f32 * step);
        let sprites = (0..SPEED_BANDS)
            .map(|band| sprite::scaled(&draw_gauge(band, color), scale))
            .collect();

        Self { thresholds, sprites }
    }

    pub fn thresholds(&self) -> &[f32; SPEED_BANDS] {
        &self.thresholds
    }

    /// Highest band whose threshold does not exceed `speed`
    pub fn band(&self, speed: f32) -> usize {
        (0..SPEED_BANDS)
            .rev()
            .find(|&i| speed >= self.thresholds[i])
            .unwrap_or(0)
    }

    pub fn sprite(&self, speed: f32) -> &RgbaImage {
        &self.sprites[self.band(speed)]
    }
}

/// Half-ring of `SPEED_BANDS` segments, the first `band + 1` lit
fn draw_gauge(band: usize, color: Rgba<u8>) -> RgbaImage {
    let mut image = RgbaImage::new(GAUGE_WIDTH, GAUGE_HEIGHT);
    let (cx, cy) = (GAUGE_WIDTH as f32 / 2.0, GAUGE_HEIGHT as f32 - 4.0);
    let sweep = PI / SPEED_BANDS as f32;
    let gap = sweep * 0.12;

    let point = |radius: f32, angle: f32| {
        Point::new(
            (cx + radius * angle.cos()).round() as i32,
            (cy - radius * angle.sin()).round() as i32,
        )
    };

    for segment in 0..SPEED_BANDS {
        let start = PI - segment as f32 * sweep - gap;
        let end = PI - (segment + 1) as f32 * sweep + gap;
        let polygon = [
            point(OUTER_RADIUS, start),
            point(OUTER_RADIUS, end),
            point(INNER_RADIUS, end),
            point(INNER_RADIUS, start),
        ];
        let fill = if segment <= band { color } else { UNLIT };
        draw_polygon_mut(&mut image, &polygon, fill);
    }
    image
}
