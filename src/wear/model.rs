//! Wear/cost/risk projection for a single TPMS reading.
//!
//! The model is a pure function of one `Reading` and an immutable set of
//! `ReferenceConstants`:
//!
//! 1. subpressure % below the ideal pressure (never negative)
//! 2. temperature band and pressure band effects
//! 3. wear factors compound multiplicatively, fuel penalties add
//! 4. distance is converted to tire life loss, fuel waste, cost and CO₂
//!
//! Intermediate values stay at full precision in [`WearProjection`]; rounding
//! happens once, in [`WearProjection::rounded`].

#![allow(missing_docs)]

use serde::Serialize;

use crate::core::config::WearConfig;
use crate::core::errors::{Result, TpmsError};
use crate::wear::bands::{PressureBand, TemperatureBand};

/// Reference constants, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceConstants {
    pub ideal_pressure_psi: f64,
    pub tire_cost: f64,
    pub fuel_cost_per_liter: f64,
    pub fuel_efficiency_km_per_liter: f64,
    pub tire_life_km: f64,
    pub co2_factor_kg_per_liter: f64,
    pub carbon_price_min: f64,
    pub carbon_price_max: f64,
}

impl Default for ReferenceConstants {
    fn default() -> Self {
        Self::from_config(&WearConfig::default())
    }
}

impl ReferenceConstants {
    #[must_use]
    pub fn from_config(cfg: &WearConfig) -> Self {
        Self {
            ideal_pressure_psi: cfg.ideal_pressure_psi,
            tire_cost: cfg.tire_cost,
            fuel_cost_per_liter: cfg.fuel_cost_per_liter,
            fuel_efficiency_km_per_liter: cfg.fuel_efficiency_km_per_liter,
            tire_life_km: cfg.tire_life_km,
            co2_factor_kg_per_liter: cfg.co2_factor_kg_per_liter,
            carbon_price_min: cfg.carbon_price_min,
            carbon_price_max: cfg.carbon_price_max,
        }
    }
}

/// One telemetry sample: PSI, °C, and km travelled since the tire's previous sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub pressure: f64,
    pub temperature: f64,
    pub distance: f64,
}

impl Reading {
    #[must_use]
    pub const fn new(pressure: f64, temperature: f64, distance: f64) -> Self {
        Self {
            pressure,
            temperature,
            distance,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.pressure.is_finite() {
            return Err(TpmsError::InvalidReading {
                details: format!("pressure must be finite, got {}", self.pressure),
            });
        }
        if !self.temperature.is_finite() {
            return Err(TpmsError::InvalidReading {
                details: format!("temperature must be finite, got {}", self.temperature),
            });
        }
        if !self.distance.is_finite() || self.distance < 0.0 {
            return Err(TpmsError::InvalidReading {
                details: format!("distance must be a finite value >= 0, got {}", self.distance),
            });
        }
        Ok(())
    }
}

/// Full-precision projection of one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WearProjection {
    pub reading: Reading,
    pub temperature_band: TemperatureBand,
    pub pressure_band: PressureBand,
    pub subpressure_percent: f64,
    pub temperature_wear: f64,
    pub pressure_wear: f64,
    pub wear_factor: f64,
    pub fuel_penalty_factor: f64,
    pub fuel_used_liters: f64,
    pub tire_life_loss_km: f64,
    pub tire_life_remaining_km: f64,
    pub tire_cost_per_km: f64,
    pub fuel_waste_liters: f64,
    pub extra_fuel_cost_per_km: f64,
    pub total_cost_per_km: f64,
    pub co2_reduction_kg: f64,
    pub financial_savings_min: f64,
    pub financial_savings_max: f64,
    pub risk_score: f64,
}

/// Display-stable wear result. Field precision:
///
/// | field | decimals |
/// |---|---|
/// | `subpressure_percent` | 2 |
/// | `wear_factor`, `fuel_penalty_factor`, `fuel_used_liters` | 3 |
/// | `tire_life_loss_km`, `tire_life_remaining_km`, `fuel_waste_liters` | 2 |
/// | `tire_cost_per_km`, `extra_fuel_cost_per_km`, `total_cost_per_km` | 4 |
/// | `co2_reduction_kg`, `financial_savings_min/max`, `risk_score` | 2 |
///
/// The `*_per_km` costs are the amounts attributed to the reading's distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WearResult {
    pub pressure: f64,
    pub temperature: f64,
    pub distance: f64,
    pub temperature_band: TemperatureBand,
    pub pressure_band: PressureBand,
    pub subpressure_percent: f64,
    pub wear_factor: f64,
    pub fuel_penalty_factor: f64,
    pub fuel_used_liters: f64,
    pub tire_life_loss_km: f64,
    pub tire_life_remaining_km: f64,
    pub tire_cost_per_km: f64,
    pub fuel_waste_liters: f64,
    pub extra_fuel_cost_per_km: f64,
    pub total_cost_per_km: f64,
    pub co2_reduction_kg: f64,
    pub financial_savings_min: f64,
    pub financial_savings_max: f64,
    /// Relative ranking only; not comparable to any absolute scale.
    pub risk_score: f64,
}

impl WearProjection {
    /// Round every field to its documented precision.
    #[must_use]
    pub fn rounded(&self) -> WearResult {
        WearResult {
            pressure: self.reading.pressure,
            temperature: self.reading.temperature,
            distance: self.reading.distance,
            temperature_band: self.temperature_band,
            pressure_band: self.pressure_band,
            subpressure_percent: round_to(self.subpressure_percent, 2),
            wear_factor: round_to(self.wear_factor, 3),
            fuel_penalty_factor: round_to(self.fuel_penalty_factor, 3),
            fuel_used_liters: round_to(self.fuel_used_liters, 3),
            tire_life_loss_km: round_to(self.tire_life_loss_km, 2),
            tire_life_remaining_km: round_to(self.tire_life_remaining_km, 2),
            tire_cost_per_km: round_to(self.tire_cost_per_km, 4),
            fuel_waste_liters: round_to(self.fuel_waste_liters, 2),
            extra_fuel_cost_per_km: round_to(self.extra_fuel_cost_per_km, 4),
            total_cost_per_km: round_to(self.total_cost_per_km, 4),
            co2_reduction_kg: round_to(self.co2_reduction_kg, 2),
            financial_savings_min: round_to(self.financial_savings_min, 2),
            financial_savings_max: round_to(self.financial_savings_max, 2),
            risk_score: round_to(self.risk_score, 2),
        }
    }
}

/// Deterministic wear model over a fixed set of reference constants.
#[derive(Debug, Clone)]
pub struct WearModel {
    constants: ReferenceConstants,
}

impl Default for WearModel {
    fn default() -> Self {
        Self::new(ReferenceConstants::default())
    }
}

impl WearModel {
    #[must_use]
    pub const fn new(constants: ReferenceConstants) -> Self {
        Self { constants }
    }

    #[must_use]
    pub fn from_config(cfg: &WearConfig) -> Self {
        Self::new(ReferenceConstants::from_config(cfg))
    }

    #[must_use]
    pub const fn constants(&self) -> &ReferenceConstants {
        &self.constants
    }

    /// Percentage below ideal pressure; over-pressure contributes 0.
    #[must_use]
    pub fn subpressure_percent(&self, pressure: f64) -> f64 {
        let ideal = self.constants.ideal_pressure_psi;
        ((ideal - pressure) / ideal * 100.0).max(0.0)
    }

    /// Evaluate one reading and round at the boundary.
    pub fn evaluate(&self, reading: &Reading) -> Result<WearResult> {
        self.project(reading).map(|projection| projection.rounded())
    }

    /// Evaluate one reading at full precision.
    pub fn project(&self, reading: &Reading) -> Result<WearProjection> {
        reading.validate()?;
        let c = &self.constants;

        let subpressure_percent = self.subpressure_percent(reading.pressure);
        let temperature_band = TemperatureBand::classify(reading.temperature);
        let pressure_band = PressureBand::classify(subpressure_percent);
        let temp = temperature_band.effect();
        let press = pressure_band.effect();

        let wear_factor = temp.wear * press.wear;
        let fuel_penalty_factor = temp.fuel_penalty + press.fuel_penalty;

        let fuel_used_liters = reading.distance / c.fuel_efficiency_km_per_liter;
        let tire_life_loss_km = reading.distance * wear_factor;
        let tire_life_remaining_km = (c.tire_life_km - tire_life_loss_km).max(0.0);
        let tire_cost_per_km = (c.tire_cost / c.tire_life_km) * tire_life_loss_km;

        let fuel_waste_liters = fuel_used_liters * fuel_penalty_factor;
        let extra_fuel_cost_per_km = fuel_waste_liters * c.fuel_cost_per_liter;
        let total_cost_per_km = tire_cost_per_km + extra_fuel_cost_per_km;

        let co2_reduction_kg = fuel_waste_liters * c.co2_factor_kg_per_liter;
        let risk_score = wear_factor.mul_add(2.0, fuel_penalty_factor * 100.0);

        Ok(WearProjection {
            reading: *reading,
            temperature_band,
            pressure_band,
            subpressure_percent,
            temperature_wear: temp.wear,
            pressure_wear: press.wear,
            wear_factor,
            fuel_penalty_factor,
            fuel_used_liters,
            tire_life_loss_km,
            tire_life_remaining_km,
            tire_cost_per_km,
            fuel_waste_liters,
            extra_fuel_cost_per_km,
            total_cost_per_km,
            co2_reduction_kg,
            financial_savings_min: co2_reduction_kg * c.carbon_price_min,
            financial_savings_max: co2_reduction_kg * c.carbon_price_max,
            risk_score,
        })
    }
}

/// Round half away from zero to `places` decimals.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10_f64.powi(places);
    (value * scale).round() / scale
}
