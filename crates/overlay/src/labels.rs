//! Overlay label text

use storage::GRAVITY;

use crate::units::UnitSystem;

pub const ACCELERATION_UNIT: &str = "g";

/// Speed from m/s, rounded to whole display units
pub fn speed(speed_mps: f32, units: UnitSystem) -> String {
    format!("{}", (speed_mps * units.speed_factor()).round() as i64)
}

/// Absolute lean angle in degrees
pub fn lean_angle(roll: i32) -> String {
    format!("{}º", roll.unsigned_abs())
}

/// Acceleration magnitude in g with two decimals
pub fn acceleration(scalar_mps2: f32) -> String {
    format!("{:.2}", (scalar_mps2 / GRAVITY).abs())
}

/// Distance or altitude from metres, rounded, with unit suffix
pub fn length(metres: f64, units: UnitSystem) -> String {
    let value = (metres * units.distance_factor() as f64).round() as i64;
    format!("{}{}", value, units.distance_label())
}

pub fn terrain_inclination(percent: i32) -> String {
    format!("{}%", percent)
}
