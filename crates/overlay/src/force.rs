//! Acceleration force icons
//!
//! Icons are looked up in a fixed intensity x direction table built once.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_polygon_mut};
use imageproc::point::Point;
use storage::AccelerationDirection;

use crate::sprite;

const ICON_SIZE: u32 = 70;
const RING_RADIUS: i32 = 31;

/// Acceleration magnitude class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForceIntensity {
    /// Below 0.2 g
    None,
    /// 0.2 to 0.8 g
    Light,
    /// 0.8 to 1.2 g
    Moderate,
    /// Above 1.2 g
    Heavy,
}

impl ForceIntensity {
    pub const ALL: [ForceIntensity; 4] = [
        ForceIntensity::None,
        ForceIntensity::Light,
        ForceIntensity::Moderate,
        ForceIntensity::Heavy,
    ];

    pub fn from_g(g: f32) -> Self {
        let g = g.abs();
        if g < 0.2 {
            ForceIntensity::None
        } else if g <= 0.8 {
            ForceIntensity::Light
        } else if g <= 1.2 {
            ForceIntensity::Moderate
        } else {
            ForceIntensity::Heavy
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    fn arrow_length(self) -> f32 {
        match self {
            ForceIntensity::None => 0.0,
            ForceIntensity::Light => 13.0,
            ForceIntensity::Moderate => 20.0,
            ForceIntensity::Heavy => 27.0,
        }
    }

    fn arrow_color(self) -> Rgba<u8> {
        match self {
            ForceIntensity::None | ForceIntensity::Light => Rgba([250, 220, 40, 255]),
            ForceIntensity::Moderate => Rgba([250, 140, 20, 255]),
            ForceIntensity::Heavy => Rgba([230, 30, 30, 255]),
        }
    }
}

/// Screen-space unit vector (y down), `None` for the direction-less icon
fn direction_vector(direction: AccelerationDirection) -> Option<(f32, f32)> {
    let d = std::f32::consts::FRAC_1_SQRT_2;
    let vector = match direction {
        AccelerationDirection::None => return None,
        AccelerationDirection::Left => (-1.0, 0.0),
        AccelerationDirection::FrontLeft => (-d, -d),
        AccelerationDirection::Front => (0.0, -1.0),
        AccelerationDirection::FrontRight => (d, -d),
        AccelerationDirection::Right => (1.0, 0.0),
        AccelerationDirection::BackRight => (d, d),
        AccelerationDirection::Back => (0.0, 1.0),
        AccelerationDirection::BackLeft => (-d, d),
    };
    Some(vector)
}

pub struct ForceIcons {
    table: [[RgbaImage; 9]; 4],
}

impl ForceIcons {
    pub fn new(scale: f32, color: Rgba<u8>) -> Self {
        let table = std::array::from_fn(|i| {
            std::array::from_fn(|d| {
                let icon = draw_icon(ForceIntensity::ALL[i], AccelerationDirection::ALL[d], color);
                sprite::scaled(&icon, scale)
            })
        });
        Self { table }
    }

    /// Icon for a magnitude in g and a direction. Below 0.2 g the
    /// direction-less icon is used whatever the direction.
    pub fn icon(&self, g: f32, direction: AccelerationDirection) -> &RgbaImage {
        let intensity = ForceIntensity::from_g(g);
        let direction = match intensity {
            ForceIntensity::None => AccelerationDirection::None,
            _ => direction,
        };
        &self.table[intensity.index()][direction.index()]
    }
}

fn draw_icon(intensity: ForceIntensity, direction: AccelerationDirection, color: Rgba<u8>) -> RgbaImage {
    let mut image = RgbaImage::new(ICON_SIZE, ICON_SIZE);
    let c = (ICON_SIZE / 2) as i32;

    draw_hollow_circle_mut(&mut image, (c, c), RING_RADIUS, color);
    draw_hollow_circle_mut(&mut image, (c, c), RING_RADIUS - 1, color);
    draw_filled_circle_mut(&mut image, (c, c), 4, color);

    let length = intensity.arrow_length();
    if let Some((dx, dy)) = direction_vector(direction).filter(|_| length > 0.0) {
        let (cx, cy) = (c as f32, c as f32);
        let base = (cx + dx * 6.0, cy + dy * 6.0);
        let half_width = 7.0 + length / 6.0;
        let arrow = [
            Point::new((cx + dx * length).round() as i32, (cy + dy * length).round() as i32),
            Point::new((base.0 - dy * half_width).round() as i32, (base.1 + dx * half_width).round() as i32),
            Point::new((base.0 + dy * half_width).round() as i32, (base.1 - dx * half_width).round() as i32),
        ];
        draw_polygon_mut(&mut image, &arrow, intensity.arrow_color());
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_boundaries() {
        assert_eq!(ForceIntensity::from_g(0.19), ForceIntensity::None);
        assert_eq!(ForceIntensity::from_g(0.2), ForceIntensity::Light);
        assert_eq!(ForceIntensity::from_g(0.8), ForceIntensity::Light);
        assert_eq!(ForceIntensity::from_g(0.81), ForceIntensity::Moderate);
        assert_eq!(ForceIntensity::from_g(1.2), ForceIntensity::Moderate);
        assert_eq!(ForceIntensity::from_g(1.5), ForceIntensity::Heavy);
        assert_eq!(ForceIntensity::from_g(-1.5), ForceIntensity::Heavy);
    }

    #[test]
    fn test_weak_force_ignores_direction() {
        let icons = ForceIcons::new(1.0, Rgba([255, 255, 255, 255]));
        let reference = icons.icon(0.1, AccelerationDirection::None);
        for direction in AccelerationDirection::ALL {
            assert!(std::ptr::eq(icons.icon(0.1, direction), reference));
        }
    }

    #[test]
    fn test_icons_vary_by_direction_and_intensity() {
        let icons = ForceIcons::new(1.0, Rgba([255, 255, 255, 255]));
        let heavy_left = icons.icon(1.5, AccelerationDirection::Left);
        assert_ne!(heavy_left.as_raw(), icons.icon(1.5, AccelerationDirection::Right).as_raw());
        assert_ne!(heavy_left.as_raw(), icons.icon(0.5, AccelerationDirection::Left).as_raw());
        assert_eq!(heavy_left.dimensions(), (ICON_SIZE, ICON_SIZE));
    }
}
