//! Telemetry Overlay
//!
//! Graphics and labels drawn onto composed ride video:
//! - Speed gauge with one graphic per band up to the session maximum
//! - Lean angle gauge in 5 degree buckets, separate left and right sets
//! - Force icons from a fixed intensity x direction table
//! - Distance, altitude and terrain inclination labels
//!
//! Everything is sized from a 1024x720 reference and scaled by output area.

pub mod force;
pub mod labels;
pub mod layout;
pub mod lean;
pub mod renderer;
pub mod speed;
pub mod sprite;
pub mod text;
pub mod units;

pub use force::{ForceIcons, ForceIntensity};
pub use layout::{scale_for, Layout};
pub use lean::{LeanBucket, LeanGauge};
pub use renderer::{OverlayRenderer, OverlayStyle};
pub use speed::{SpeedGauge, SPEED_BANDS};
pub use text::TextRenderer;
pub use units::UnitSystem;

use thiserror::Error;

/// Overlay error types
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Invalid output size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Frame is {actual:?}, overlay was built for {expected:?}")]
    SizeMismatch { expected: (u32, u32), actual: (u32, u32) },
}
