#![forbid(unsafe_code)]

//! TPMS Insight (tpms): tire wear projection and guarded telemetry queries
//! for fleet tire-pressure monitoring data.
//!
//! Three cooperating pieces:
//! 1. **Wear model**: pressure/temperature bands turned into wear, fuel loss and risk
//! 2. **Query bounder**: read-only gate, column alias repair and LIMIT window
//! 3. **Result gateway**: execution, empty-result fallback probe and payload cap
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use tpms_insight::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use tpms_insight::core::config::Config;
//! use tpms_insight::query::bounder::QueryBounder;
//! ```

pub mod prelude;

pub mod core;
pub mod gateway;
pub mod logger;
pub mod query;
pub mod wear;
