//! Result gateway: execute the effective query and classify the outcome.
//!
//! A non-empty result is capped to `max_payload_rows` and returned as-is. An
//! empty result triggers one broadened probe over the whole validity window,
//! which tells "these filters matched nothing" apart from "the store has no
//! data". A failing probe is reported as unverified rather than as an error.

#![allow(missing_docs)]

use std::time::Instant;

use serde::Serialize;

use crate::core::config::{Config, FallbackConfig, ValidityConfig};
use crate::core::errors::Result;
use crate::gateway::record::records;
use crate::gateway::store::TelemetryStore;
use crate::gateway::value::RowSet;
use crate::logger::jsonl::{AuditEntry, AuditEvent, AuditLog, Severity};
use crate::query::bounder::{BoundedQuery, QueryBounder};

/// Columns projected by the broadening probe.
pub const PROBE_COLUMNS: [&str; 13] = [
    "id",
    "odometro",
    "movimento",
    "speed",
    "imei",
    "position",
    "latitude",
    "longtitude",
    "_timestamp_",
    "pressure",
    "temperature",
    "placa",
    "cliente",
];

/// Distinct discriminating values seen in the probe rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscriminatorSample {
    /// Plates, or device ids for rows without a plate.
    pub vehicles: Vec<String>,
    pub positions: Vec<i64>,
}

impl DiscriminatorSample {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.positions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GatewayOutcome {
    /// The effective query returned rows.
    Rows {
        rows: RowSet,
        /// Rows dropped by the payload cap.
        truncated: bool,
        /// Row count before the payload cap.
        total_rows: usize,
    },
    /// No match, but the store does hold valid readings.
    CriteriaTooNarrow {
        columns: Vec<String>,
        probe_rows: usize,
        sample: DiscriminatorSample,
    },
    /// No match and the store holds no valid readings at all.
    StoreEmpty { columns: Vec<String> },
    /// No match, and the probe itself failed.
    Unverified { columns: Vec<String>, reason: String },
}

impl GatewayOutcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Rows { .. } => "rows",
            Self::CriteriaTooNarrow { .. } => "criteria_too_narrow",
            Self::StoreEmpty { .. } => "store_empty",
            Self::Unverified { .. } => "unverified",
        }
    }

    /// Returned rows; `None` for every empty-result outcome.
    #[must_use]
    pub fn rows(&self) -> Option<&RowSet> {
        match self {
            Self::Rows { rows, .. } => Some(rows),
            _ => None,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        match self {
            Self::Rows { rows, .. } => &rows.columns,
            Self::CriteriaTooNarrow { columns, .. }
            | Self::StoreEmpty { columns }
            | Self::Unverified { columns, .. } => columns,
        }
    }
}

/// Bounded query plus its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReport {
    pub query: BoundedQuery,
    pub outcome: GatewayOutcome,
    pub duration_ms: u64,
}

/// Build the broadening probe for `table`.
#[must_use]
pub fn fallback_sql(table: &str, validity: &ValidityConfig, limit: u64) -> String {
    format!(
        "SELECT {columns} FROM {table} \
         WHERE pressure >= {pmin} AND pressure <= {pmax} \
         AND temperature >= {tmin} AND temperature <= {tmax} \
         ORDER BY _timestamp_ DESC LIMIT {limit}",
        columns = PROBE_COLUMNS.join(", "),
        pmin = validity.pressure_min,
        pmax = validity.pressure_max,
        tmin = validity.temperature_min,
        tmax = validity.temperature_max,
    )
}

pub struct ResultGateway<S> {
    store: S,
    max_payload_rows: usize,
    fallback_sql: String,
    fallback: FallbackConfig,
    audit: AuditLog,
}

impl<S> std::fmt::Debug for ResultGateway<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultGateway")
            .field("max_payload_rows", &self.max_payload_rows)
            .field("fallback_sql", &self.fallback_sql)
            .finish_non_exhaustive()
    }
}

impl<S: TelemetryStore> ResultGateway<S> {
    /// The probe text is fixed at construction; the table name comes from validated config.
    #[must_use]
    pub fn new(store: S, cfg: &Config, audit: AuditLog) -> Self {
        Self {
            store,
            max_payload_rows: cfg.query.max_payload_rows,
            fallback_sql: fallback_sql(&cfg.store.table, &cfg.validity, cfg.fallback.sample_rows),
            fallback: cfg.fallback.clone(),
            audit,
        }
    }

    #[must_use]
    pub fn fallback_query(&self) -> &str {
        &self.fallback_sql
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Bound `candidate`, audit the effective text, then execute it.
    pub fn run(&self, bounder: &QueryBounder, candidate: &str) -> Result<QueryReport> {
        let started = Instant::now();
        let query = match bounder.bound(candidate) {
            Ok(query) => query,
            Err(err) => {
                let mut entry = AuditEntry::new(AuditEvent::QueryFailed, Severity::Warning)
                    .with_error(&err);
                entry.candidate_sql = Some(candidate.to_string());
                self.audit.record(&entry);
                return Err(err);
            }
        };

        let mut entry = AuditEntry::new(AuditEvent::QueryBounded, Severity::Info);
        entry.candidate_sql = Some(query.candidate.clone());
        entry.effective_sql = Some(query.effective.clone());
        entry.limit_action = Some(query.limit.label().to_string());
        entry.limit = Some(query.limit.effective_limit());
        entry.aliases = query
            .rewritten_aliases
            .iter()
            .map(|r| format!("{}->{}", r.from, r.to))
            .collect();
        self.audit.record(&entry);

        let outcome = self.execute(&query.effective)?;
        Ok(QueryReport {
            query,
            outcome,
            duration_ms: elapsed_ms(started),
        })
    }

    /// Execute an already-bounded statement. Exactly one attempt; no retry.
    pub fn execute(&self, effective_sql: &str) -> Result<GatewayOutcome> {
        let started = Instant::now();
        let mut rows = match self.store.execute(effective_sql) {
            Ok(rows) => rows,
            Err(err) => {
                let err = err.with_sql(effective_sql);
                let mut entry =
                    AuditEntry::new(AuditEvent::QueryFailed, Severity::Error).with_error(&err);
                entry.effective_sql = Some(effective_sql.to_string());
                entry.duration_ms = Some(elapsed_ms(started));
                self.audit.record(&entry);
                return Err(err);
            }
        };

        let outcome = if rows.is_empty() {
            self.classify_empty(std::mem::take(&mut rows.columns))
        } else {
            let total_rows = rows.len();
            let truncated = rows.truncate(self.max_payload_rows);
            GatewayOutcome::Rows {
                rows,
                truncated,
                total_rows,
            }
        };

        let mut entry = AuditEntry::new(AuditEvent::QueryExecuted, Severity::Info);
        entry.effective_sql = Some(effective_sql.to_string());
        entry.outcome = Some(outcome.label().to_string());
        entry.duration_ms = Some(elapsed_ms(started));
        if let GatewayOutcome::Rows {
            rows,
            truncated,
            total_rows,
        } = &outcome
        {
            entry.rows = Some(rows.len());
            entry.total_rows = Some(*total_rows);
            entry.truncated = Some(*truncated);
        }
        self.audit.record(&entry);

        Ok(outcome)
    }

    fn classify_empty(&self, columns: Vec<String>) -> GatewayOutcome {
        let mut entry = AuditEntry::new(AuditEvent::FallbackProbe, Severity::Warning);
        entry.effective_sql = Some(self.fallback_sql.clone());

        let outcome = match self.store.execute(&self.fallback_sql) {
            Ok(probe) if probe.is_empty() => GatewayOutcome::StoreEmpty { columns },
            Ok(probe) => {
                let probe_rows = probe.len();
                entry.rows = Some(probe_rows);
                GatewayOutcome::CriteriaTooNarrow {
                    columns,
                    probe_rows,
                    sample: self.discriminators(&probe),
                }
            }
            Err(err) => {
                let err = err.with_sql(&self.fallback_sql);
                entry = entry.with_error(&err);
                GatewayOutcome::Unverified {
                    columns,
                    reason: err.to_string(),
                }
            }
        };

        entry.outcome = Some(outcome.label().to_string());
        self.audit.record(&entry);
        outcome
    }

    fn discriminators(&self, probe: &RowSet) -> DiscriminatorSample {
        let window = RowSet::new(
            probe.columns.clone(),
            probe
                .rows
                .iter()
                .take(self.fallback.discriminator_window)
                .cloned()
                .collect(),
        );
        let max = self.fallback.max_distinct;
        let mut sample = DiscriminatorSample::default();
        for record in records(&window) {
            if sample.vehicles.len() < max
                && let Some(vehicle) = record.vehicle()
                && !sample.vehicles.iter().any(|v| v == vehicle)
            {
                sample.vehicles.push(vehicle.to_string());
            }
            if sample.positions.len() < max
                && let Some(position) = record.position
                && !sample.positions.contains(&position)
            {
                sample.positions.push(position);
            }
        }
        sample
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
