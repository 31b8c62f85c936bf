//! Execution boundary: store access, typed records and empty-result classification.

#[cfg(feature = "sqlite")]
pub mod demo;
#[cfg(feature = "sqlite")]
pub mod pool;
pub mod record;
pub mod result;
pub mod store;
pub mod value;

pub use record::{ColumnMap, Extraction, ReadingExtractor, TelemetryRecord};
pub use result::{DiscriminatorSample, GatewayOutcome, QueryReport, ResultGateway};
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
pub use store::TelemetryStore;
pub use value::{CellValue, RowSet};
