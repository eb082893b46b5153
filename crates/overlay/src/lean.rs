//! Lean angle gauge

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::sprite;

/// Angles up to this magnitude show the level graphic
pub const LEVEL_THRESHOLD: u32 = 5;
pub const BUCKET_STEP: u32 = 5;
pub const MAX_BUCKET: u32 = 90;

const BUCKETS: usize = (MAX_BUCKET / BUCKET_STEP) as usize;
const GAUGE_WIDTH: u32 = 130;
const GAUGE_HEIGHT: u32 = 72;
const NEEDLE_LENGTH: f32 = 58.0;
const SCALE_COLOR: Rgba<u8> = Rgba([200, 200, 200, 180]);

/// Graphic selected for a lean angle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeanBucket {
    Level,
    /// Leaning right, rounded down to a multiple of 5
    Positive(u32),
    /// Leaning left, rounded down to a multiple of 5
    Negative(u32),
}

impl LeanBucket {
    pub fn from_angle(angle: i32) -> Self {
        let magnitude = angle.unsigned_abs();
        if magnitude <= LEVEL_THRESHOLD {
            return LeanBucket::Level;
        }
        let bucket = (magnitude / BUCKET_STEP * BUCKET_STEP).min(MAX_BUCKET);
        if angle > 0 {
            LeanBucket::Positive(bucket)
        } else {
            LeanBucket::Negative(bucket)
        }
    }

    /// Signed needle angle in degrees
    fn degrees(self) -> f32 {
        match self {
            LeanBucket::Level => 0.0,
            LeanBucket::Positive(bucket) => bucket as f32,
            LeanBucket::Negative(bucket) => -(bucket as f32),
        }
    }
}

/// Protractor with a needle, one graphic per bucket and side
pub struct LeanGauge {
    level: RgbaImage,
    positive: Vec<RgbaImage>,
    negative: Vec<RgbaImage>,
}

impl LeanGauge {
    pub fn new(scale: f32, color: Rgba<u8>) -> Self {
        let render = |bucket: LeanBucket| sprite::scaled(&draw_gauge(bucket.degrees(), color), scale);
        let buckets = || (1..=BUCKETS as u32).map(|i| i * BUCKET_STEP);

        Self {
            level: render(LeanBucket::Level),
            positive: buckets().map(|b| render(LeanBucket::Positive(b))).collect(),
            negative: buckets().map(|b| render(LeanBucket::Negative(b))).collect(),
        }
    }

    pub fn sprite(&self, angle: i32) -> &RgbaImage {
        match LeanBucket::from_angle(angle) {
            LeanBucket::Level => &self.level,
            LeanBucket::Positive(bucket) => &self.positive[(bucket / BUCKET_STEP) as usize - 1],
            LeanBucket::Negative(bucket) => &self.negative[(bucket / BUCKET_STEP) as usize - 1],
        }
    }
}

fn draw_gauge(degrees: f32, color: Rgba<u8>) -> RgbaImage {
    let mut image = RgbaImage::new(GAUGE_WIDTH, GAUGE_HEIGHT);
    let (cx, cy) = (GAUGE_WIDTH as f32 / 2.0, GAUGE_HEIGHT as f32 - 6.0);

    // Ticks every 15 degrees from -90 to 90
    for step in -6..=6 {
        let angle = (step as f32 * 15.0).to_radians();
        let x = cx + NEEDLE_LENGTH * angle.sin();
        let y = cy - NEEDLE_LENGTH * angle.cos();
        draw_filled_circle_mut(&mut image, (x.round() as i32, y.round() as i32), 2, SCALE_COLOR);
    }

    let angle = degrees.to_radians();
    let tip = (cx + (NEEDLE_LENGTH - 6.0) * angle.sin(), cy - (NEEDLE_LENGTH - 6.0) * angle.cos());
    for offset in -2..=2 {
        let shift = offset as f32 * 0.5;
        draw_line_segment_mut(
            &mut image,
            (cx + shift * angle.cos(), cy + shift * angle.sin()),
            (tip.0 + shift * angle.cos(), tip.1 + shift * angle.sin()),
            color,
        );
    }
    draw_filled_circle_mut(&mut image, (cx.round() as i32, cy.round() as i32), 5, color);
    image
}
