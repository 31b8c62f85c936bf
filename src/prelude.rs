//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use tpms_insight::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, TpmsError};

// Wear
pub use crate::wear::bands::{PressureBand, TemperatureBand};
pub use crate::wear::fleet::{FleetSummary, TireKey, TireReading, summarize};
pub use crate::wear::model::{Reading, WearModel, WearResult};

// Query
pub use crate::query::aliases::AliasTable;
pub use crate::query::bounder::{BoundedQuery, LimitAction, QueryBounder};

// Gateway
#[cfg(feature = "sqlite")]
pub use crate::gateway::store::SqliteStore;
pub use crate::gateway::record::{ReadingExtractor, TelemetryRecord};
pub use crate::gateway::result::{GatewayOutcome, QueryReport, ResultGateway};
pub use crate::gateway::store::TelemetryStore;
pub use crate::gateway::value::{CellValue, RowSet};

// Logging
pub use crate::logger::jsonl::{AuditConfig, AuditLog};
