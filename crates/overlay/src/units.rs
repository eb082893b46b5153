//! Display unit conversion

use serde::{Deserialize, Serialize};

/// Unit system for overlay labels. Telemetry is stored in SI units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    /// Multiplier from m/s
    pub fn speed_factor(self) -> f32 {
        match self {
            UnitSystem::Metric => 3.6,
            UnitSystem::Imperial => 2.23694,
        }
    }

    pub fn speed_label(self) -> &'static str {
        match self {
            UnitSystem::Metric => "km/h",
            UnitSystem::Imperial => "mph",
        }
    }

    /// Multiplier from metres
    pub fn distance_factor(self) -> f32 {
        match self {
            UnitSystem::Metric => 1.0,
            UnitSystem::Imperial => 3.28084,
        }
    }

    pub fn distance_label(self) -> &'static str {
        match self {
            UnitSystem::Metric => "m",
            UnitSystem::Imperial => "ft",
        }
    }
}
