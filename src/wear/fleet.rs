//! Per-tire roll-up of wear projections over a result set.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::core::errors::Result;
use crate::wear::bands::{PressureBand, TemperatureBand};
use crate::wear::model::{Reading, WearModel, WearProjection, round_to};

/// Identity of one physical tire: vehicle (plate, or device id when no plate) + position code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TireKey {
    pub vehicle: String,
    pub position: i64,
}

impl TireKey {
    #[must_use]
    pub fn new(vehicle: impl Into<String>, position: i64) -> Self {
        Self {
            vehicle: vehicle.into(),
            position,
        }
    }
}

impl fmt::Display for TireKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.vehicle, self.position)
    }
}

/// A reading attributed to a tire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TireReading {
    pub key: TireKey,
    pub reading: Reading,
}

/// Rounded totals for one tire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TireSummary {
    pub vehicle: String,
    pub position: i64,
    pub readings: usize,
    pub distance_km: f64,
    pub tire_life_loss_km: f64,
    pub tire_cost: f64,
    pub fuel_waste_liters: f64,
    pub extra_fuel_cost: f64,
    pub total_cost: f64,
    pub co2_reduction_kg: f64,
    pub financial_savings_min: f64,
    pub financial_savings_max: f64,
    pub mean_risk_score: f64,
    pub max_risk_score: f64,
    pub worst_temperature_band: TemperatureBand,
    pub worst_pressure_band: PressureBand,
}

/// Rounded fleet-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetTotals {
    pub tires: usize,
    pub readings: usize,
    pub excluded_readings: usize,
    pub distance_km: f64,
    pub tire_life_loss_km: f64,
    pub tire_cost: f64,
    pub fuel_waste_liters: f64,
    pub extra_fuel_cost: f64,
    pub total_cost: f64,
    pub co2_reduction_kg: f64,
    pub financial_savings_min: f64,
    pub financial_savings_max: f64,
    pub mean_risk_score: f64,
}

/// Fleet summary, tires ranked by descending max risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSummary {
    pub tires: Vec<TireSummary>,
    pub totals: FleetTotals,
}

#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    readings: usize,
    distance_km: f64,
    tire_life_loss_km: f64,
    tire_cost: f64,
    fuel_waste_liters: f64,
    extra_fuel_cost: f64,
    total_cost: f64,
    co2_reduction_kg: f64,
    savings_min: f64,
    savings_max: f64,
    risk_sum: f64,
}

impl Sums {
    fn add(&mut self, p: &WearProjection) {
        self.readings += 1;
        self.distance_km += p.reading.distance;
        self.tire_life_loss_km += p.tire_life_loss_km;
        self.tire_cost += p.tire_cost_per_km;
        self.fuel_waste_liters += p.fuel_waste_liters;
        self.extra_fuel_cost += p.extra_fuel_cost_per_km;
        self.total_cost += p.total_cost_per_km;
        self.co2_reduction_kg += p.co2_reduction_kg;
        self.savings_min += p.financial_savings_min;
        self.savings_max += p.financial_savings_max;
        self.risk_sum += p.risk_score;
    }

    fn merge(&mut self, other: &Self) {
        self.readings += other.readings;
        self.distance_km += other.distance_km;
        self.tire_life_loss_km += other.tire_life_loss_km;
        self.tire_cost += other.tire_cost;
        self.fuel_waste_liters += other.fuel_waste_liters;
        self.extra_fuel_cost += other.extra_fuel_cost;
        self.total_cost += other.total_cost;
        self.co2_reduction_kg += other.co2_reduction_kg;
        self.savings_min += other.savings_min;
        self.savings_max += other.savings_max;
        self.risk_sum += other.risk_sum;
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean_risk(&self) -> f64 {
        if self.readings == 0 {
            0.0
        } else {
            self.risk_sum / self.readings as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TireAccumulator {
    sums: Sums,
    max_risk: f64,
    worst_temperature: TemperatureBand,
    worst_pressure: PressureBand,
}

impl TireAccumulator {
    fn from_projection(p: &WearProjection) -> Self {
        let mut sums = Sums::default();
        sums.add(p);
        Self {
            sums,
            max_risk: p.risk_score,
            worst_temperature: p.temperature_band,
            worst_pressure: p.pressure_band,
        }
    }

    fn add(&mut self, p: &WearProjection) {
        self.sums.add(p);
        self.max_risk = self.max_risk.max(p.risk_score);
        self.worst_temperature = self.worst_temperature.max(p.temperature_band);
        self.worst_pressure = self.worst_pressure.max(p.pressure_band);
    }
}

/// Accumulates full-precision projections per tire; rounds once in [`Self::finish`].
#[derive(Debug)]
pub struct FleetAggregator<'a> {
    model: &'a WearModel,
    tires: BTreeMap<TireKey, TireAccumulator>,
    excluded: usize,
}

impl<'a> FleetAggregator<'a> {
    #[must_use]
    pub const fn new(model: &'a WearModel) -> Self {
        Self {
            model,
            tires: BTreeMap::new(),
            excluded: 0,
        }
    }

    /// Project one reading and add it to its tire's totals.
    pub fn push(&mut self, tire_reading: &TireReading) -> Result<()> {
        let projection = self.model.project(&tire_reading.reading)?;
        match self.tires.get_mut(&tire_reading.key) {
            Some(acc) => acc.add(&projection),
            None => {
                self.tires.insert(
                    tire_reading.key.clone(),
                    TireAccumulator::from_projection(&projection),
                );
            }
        }
        Ok(())
    }

    /// Record readings dropped upstream (outside the validity window).
    pub fn note_excluded(&mut self, count: usize) {
        self.excluded += count;
    }

    #[must_use]
    pub fn finish(self) -> FleetSummary {
        let mut fleet = Sums::default();
        let mut tires: Vec<TireSummary> = self
            .tires
            .into_iter()
            .map(|(key, acc)| {
                fleet.merge(&acc.sums);
                let s = &acc.sums;
                TireSummary {
                    vehicle: key.vehicle,
                    position: key.position,
                    readings: s.readings,
                    distance_km: round_to(s.distance_km, 2),
                    tire_life_loss_km: round_to(s.tire_life_loss_km, 2),
                    tire_cost: round_to(s.tire_cost, 4),
                    fuel_waste_liters: round_to(s.fuel_waste_liters, 2),
                    extra_fuel_cost: round_to(s.extra_fuel_cost, 4),
                    total_cost: round_to(s.total_cost, 4),
                    co2_reduction_kg: round_to(s.co2_reduction_kg, 2),
                    financial_savings_min: round_to(s.savings_min, 2),
                    financial_savings_max: round_to(s.savings_max, 2),
                    mean_risk_score: round_to(s.mean_risk(), 2),
                    max_risk_score: round_to(acc.max_risk, 2),
                    worst_temperature_band: acc.worst_temperature,
                    worst_pressure_band: acc.worst_pressure,
                }
            })
            .collect();

        // Stable: BTreeMap order breaks ties by vehicle then position.
        tires.sort_by(|a, b| b.max_risk_score.total_cmp(&a.max_risk_score));

        let totals = FleetTotals {
            tires: tires.len(),
            readings: fleet.readings,
            excluded_readings: self.excluded,
            distance_km: round_to(fleet.distance_km, 2),
            tire_life_loss_km: round_to(fleet.tire_life_loss_km, 2),
            tire_cost: round_to(fleet.tire_cost, 4),
            fuel_waste_liters: round_to(fleet.fuel_waste_liters, 2),
            extra_fuel_cost: round_to(fleet.extra_fuel_cost, 4),
            total_cost: round_to(fleet.total_cost, 4),
            co2_reduction_kg: round_to(fleet.co2_reduction_kg, 2),
            financial_savings_min: round_to(fleet.savings_min, 2),
            financial_savings_max: round_to(fleet.savings_max, 2),
            mean_risk_score: round_to(fleet.mean_risk(), 2),
        };

        FleetSummary { tires, totals }
    }
}

/// Summarize a batch of readings in one call.
pub fn summarize<'r>(
    model: &WearModel,
    readings: impl IntoIterator<Item = &'r TireReading>,
    excluded: usize,
) -> Result<FleetSummary> {
    let mut aggregator = FleetAggregator::new(model);
    for reading in readings {
        aggregator.push(reading)?;
    }
    aggregator.note_excluded(excluded);
    Ok(aggregator.finish())
}
