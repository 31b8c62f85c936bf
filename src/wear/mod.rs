//! Tire wear, fuel waste, cost and risk projection.

pub mod bands;
pub mod fleet;
pub mod model;

pub use bands::{BandEffect, PressureBand, TemperatureBand};
pub use fleet::{FleetAggregator, FleetSummary, FleetTotals, TireKey, TireReading, TireSummary};
pub use model::{ReferenceConstants, Reading, WearModel, WearProjection, WearResult};
