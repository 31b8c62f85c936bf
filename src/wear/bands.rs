//! Temperature and pressure bands: discrete wear/fuel multipliers by operating condition.

#![allow(missing_docs)]

use serde::Serialize;

/// Wear multiplier and fuel-penalty fraction contributed by one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandEffect {
    pub wear: f64,
    pub fuel_penalty: f64,
}

/// Tire temperature band. Upper bounds are inclusive: 65, 75 and 85 °C belong to the lower band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureBand {
    /// ≤ 65 °C
    Normal,
    /// (65, 75] °C
    Warm,
    /// (75, 85] °C
    Hot,
    /// > 85 °C
    Overheated,
}

impl TemperatureBand {
    pub const ALL: [Self; 4] = [Self::Normal, Self::Warm, Self::Hot, Self::Overheated];

    #[must_use]
    pub fn classify(temperature_c: f64) -> Self {
        if temperature_c <= 65.0 {
            Self::Normal
        } else if temperature_c <= 75.0 {
            Self::Warm
        } else if temperature_c <= 85.0 {
            Self::Hot
        } else {
            Self::Overheated
        }
    }

    #[must_use]
    pub const fn effect(self) -> BandEffect {
        match self {
            Self::Normal => BandEffect {
                wear: 1.0,
                fuel_penalty: 0.0,
            },
            Self::Warm => BandEffect {
                wear: 1.3,
                fuel_penalty: 0.015,
            },
            Self::Hot => BandEffect {
                wear: 1.7,
                fuel_penalty: 0.03,
            },
            Self::Overheated => BandEffect {
                wear: 2.2,
                fuel_penalty: 0.05,
            },
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warm => "warm",
            Self::Hot => "hot",
            Self::Overheated => "overheated",
        }
    }
}

/// Under-inflation band keyed on subpressure percentage, checked from the most severe down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureBand {
    /// ≤ 5 %
    Nominal,
    /// (5, 10] %
    Slight,
    /// (10, 20] %
    Moderate,
    /// (20, 40] %
    Severe,
    /// > 40 %
    Critical,
}

impl PressureBand {
    pub const ALL: [Self; 5] = [
        Self::Nominal,
        Self::Slight,
        Self::Moderate,
        Self::Severe,
        Self::Critical,
    ];

    #[must_use]
    pub fn classify(subpressure_percent: f64) -> Self {
        if subpressure_percent > 40.0 {
            Self::Critical
        } else if subpressure_percent > 20.0 {
            Self::Severe
        } else if subpressure_percent > 10.0 {
            Self::Moderate
        } else if subpressure_percent > 5.0 {
            Self::Slight
        } else {
            Self::Nominal
        }
    }

    #[must_use]
    pub const fn effect(self) -> BandEffect {
        match self {
            Self::Nominal => BandEffect {
                wear: 1.0,
                fuel_penalty: 0.0,
            },
            Self::Slight => BandEffect {
                wear: 1.1,
                fuel_penalty: 0.01,
            },
            Self::Moderate => BandEffect {
                wear: 1.3,
                fuel_penalty: 0.02,
            },
            Self::Severe => BandEffect {
                wear: 1.6,
                fuel_penalty: 0.04,
            },
            Self::Critical => BandEffect {
                wear: 1.8,
                fuel_penalty: 0.06,
            },
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Slight => "slight",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::Critical => "critical",
        }
    }
}
