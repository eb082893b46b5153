//! Session data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Standard gravity (m/s²)
pub const GRAVITY: f32 = 9.81;

/// Video metadata for one recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSessionMetadata {
    pub session_id: String,
    /// When recording started
    pub start_time: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    /// Container format of the raw recording
    pub format: String,
    /// Codec of the raw recording
    pub codec: String,
    /// Frames per second
    pub frame_rate: f64,
    /// Bits per second
    pub bit_rate: u64,
    /// Raw recording path
    pub raw_path: PathBuf,
    /// Frames recorded, finalised at stop
    pub total_video_frames: u64,
    /// Calibrated display delay applied when aligning telemetry (ms)
    pub delay_ms: i64,
    /// Composed video path, set once composition finishes
    pub generated_path: Option<PathBuf>,
}

/// One recorded frame and the sync tick current when it was captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSyncRecord {
    pub session_id: String,
    /// 1-based, gap-free frame sequence number
    pub frame_number: u64,
    /// Sync timestamp (ms)
    pub sync_timestamp_ms: i64,
}

/// Location telemetry sample
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSnapshot {
    /// Sync timestamp (ms)
    pub timestamp_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude (m)
    pub altitude: f64,
    /// Ground speed (m/s)
    pub speed: f32,
    /// Distance travelled since session start (m)
    pub distance: f64,
    /// Terrain inclination (%)
    pub terrain_inclination: i32,
}

/// Inclination telemetry sample
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InclinationSnapshot {
    /// Sync timestamp (ms)
    pub timestamp_ms: i64,
    /// Lean angle (degrees, positive to the right)
    pub roll: i32,
    /// Lateral acceleration (m/s², positive to the right)
    pub acceleration_lateral: f32,
    /// Longitudinal acceleration (m/s², positive forward)
    pub acceleration_longitudinal: f32,
}

impl InclinationSnapshot {
    /// Magnitude of the horizontal acceleration (m/s²)
    pub fn acceleration_scalar(&self) -> f32 {
        self.acceleration_lateral.hypot(self.acceleration_longitudinal)
    }

    /// Sector the horizontal acceleration points to
    pub fn acceleration_direction(&self) -> AccelerationDirection {
        AccelerationDirection::from_components(self.acceleration_lateral, self.acceleration_longitudinal)
    }
}

/// Direction sector of the horizontal acceleration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccelerationDirection {
    None,
    Left,
    FrontLeft,
    Front,
    FrontRight,
    Right,
    BackRight,
    Back,
    BackLeft,
}

impl AccelerationDirection {
    pub const ALL: [AccelerationDirection; 9] = [
        AccelerationDirection::None,
        AccelerationDirection::Left,
        AccelerationDirection::FrontLeft,
        AccelerationDirection::Front,
        AccelerationDirection::FrontRight,
        AccelerationDirection::Right,
        AccelerationDirection::BackRight,
        AccelerationDirection::Back,
        AccelerationDirection::BackLeft,
    ];

    /// Classify from lateral (x, right positive) and longitudinal (y, forward
    /// positive) components. An axis dominates when it is at least twice the
    /// other; otherwise the sector is diagonal.
    pub fn from_components(lateral: f32, longitudinal: f32) -> Self {
        let (ax, ay) = (lateral.abs(), longitudinal.abs());
        if ax < f32::EPSILON && ay < f32::EPSILON {
            return AccelerationDirection::None;
        }

        if ax >= 2.0 * ay {
            if lateral > 0.0 {
                AccelerationDirection::Right
            } else {
                AccelerationDirection::Left
            }
        } else if ay >= 2.0 * ax {
            if longitudinal > 0.0 {
                AccelerationDirection::Front
            } else {
                AccelerationDirection::Back
            }
        } else {
            match (lateral > 0.0, longitudinal > 0.0) {
                (true, true) => AccelerationDirection::FrontRight,
                (false, true) => AccelerationDirection::FrontLeft,
                (true, false) => AccelerationDirection::BackRight,
                (false, false) => AccelerationDirection::BackLeft,
            }
        }
    }

    /// Position in `ALL`
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Telemetry metrics drawn on the composed video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledMetrics {
    pub speed: bool,
    pub lean_angle: bool,
    pub acceleration: bool,
    pub distance: bool,
    pub altitude: bool,
    pub terrain_inclination: bool,
}

impl Default for EnabledMetrics {
    fn default() -> Self {
        Self {
            speed: true,
            lean_angle: true,
            acceleration: true,
            distance: true,
            altitude: true,
            terrain_inclination: true,
        }
    }
}

impl EnabledMetrics {
    /// Whether any location-derived metric is drawn
    pub fn needs_location(&self) -> bool {
        self.speed || self.distance || self.altitude || self.terrain_inclination
    }

    /// Whether any inclination-derived metric is drawn
    pub fn needs_inclination(&self) -> bool {
        self.lean_angle || self.acceleration
    }
}
