#![cfg(feature = "sqlite")]

//! End-to-end gateway scenarios against real SQLite files: bounding, execution,
//! empty-result classification, payload cap, wear roll-up and audit trail.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde_json::Value;
use tpms_insight::core::config::Config;
use tpms_insight::core::errors::TpmsError;
use tpms_insight::gateway::demo::{DemoFleet, SeedSummary, schema_sql, seed_database};
use tpms_insight::gateway::record::{ReadingExtractor, records};
use tpms_insight::gateway::result::{GatewayOutcome, ResultGateway};
use tpms_insight::gateway::store::SqliteStore;
use tpms_insight::logger::jsonl::{AuditConfig, AuditLog};
use tpms_insight::query::bounder::{LimitAction, QueryBounder};
use tpms_insight::wear::fleet::summarize;
use tpms_insight::wear::model::WearModel;

const TABLE: &str = "tire_data_json_llm";

struct Fixture {
    _dir: tempfile::TempDir,
    config: Config,
    audit_path: PathBuf,
}

impl Fixture {
    fn new(database: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.database = dir.path().join(database);
        config.store.table = TABLE.to_string();
        config.paths.audit_log = dir.path().join("audit.jsonl");
        let audit_path = config.paths.audit_log.clone();
        Self {
            _dir: dir,
            config,
            audit_path,
        }
    }

    fn seeded() -> (Self, SeedSummary) {
        let fixture = Self::new("fleet.sqlite3");
        let fleet = DemoFleet {
            vehicles: 2,
            tires_per_vehicle: 4,
            samples_per_tire: 6,
            seed: 11,
            replace: false,
        };
        let summary = seed_database(&fixture.config.store.database, TABLE, &fleet).unwrap();
        (fixture, summary)
    }

    fn db(&self) -> &Path {
        &self.config.store.database
    }

    fn gateway(&self) -> ResultGateway<SqliteStore> {
        let store = SqliteStore::open(&self.config.store).unwrap();
        let audit = AuditLog::open(AuditConfig::from_paths(&self.config.paths));
        ResultGateway::new(store, &self.config, audit)
    }

    fn bounder(&self) -> QueryBounder {
        QueryBounder::from_config(&self.config.query)
    }

    fn audit_events(&self) -> Vec<Value> {
        fs::read_to_string(&self.audit_path)
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

fn count_rows(path: &Path) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |r| r.get(0))
        .unwrap()
}

#[test]
fn small_limit_is_raised_and_all_rows_come_back() {
    let (fx, seed) = Fixture::seeded();
    let report = fx
        .gateway()
        .run(&fx.bounder(), &format!("SELECT * FROM {TABLE} LIMIT 5"))
        .unwrap();

    assert_eq!(
        report.query.limit,
        LimitAction::Raised {
            from: 5,
            to: 10_000
        }
    );
    assert!(report.query.effective.ends_with("LIMIT 10000"));
    match &report.outcome {
        GatewayOutcome::Rows {
            rows,
            truncated,
            total_rows,
        } => {
            assert_eq!(rows.len(), seed.rows);
            assert_eq!(*total_rows, seed.rows);
            assert!(!truncated);
        }
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn unmatched_filter_on_populated_store_is_criteria_too_narrow() {
    let (fx, _) = Fixture::seeded();
    let report = fx
        .gateway()
        .run(
            &fx.bounder(),
            &format!("SELECT * FROM {TABLE} WHERE placa = 'NOPE000'"),
        )
        .unwrap();

    assert!(matches!(report.query.limit, LimitAction::Wrapped { limit: 50_000 }));
    match report.outcome {
        GatewayOutcome::CriteriaTooNarrow {
            columns,
            probe_rows,
            sample,
        } => {
            assert!(columns.iter().any(|c| c == "placa"));
            assert!(probe_rows > 0);
            assert_eq!(sample.vehicles.len(), 2);
            let mut positions = sample.positions.clone();
            positions.sort_unstable();
            assert_eq!(positions, vec![1, 2, 3, 4]);
        }
        other => panic!("expected criteria_too_narrow, got {other:?}"),
    }
}

#[test]
fn empty_table_is_store_empty() {
    let fx = Fixture::new("empty.sqlite3");
    Connection::open(fx.db())
        .unwrap()
        .execute_batch(&schema_sql(TABLE))
        .unwrap();

    let report = fx
        .gateway()
        .run(&fx.bounder(), &format!("SELECT pressure FROM {TABLE}"))
        .unwrap();
    assert_eq!(
        report.outcome,
        GatewayOutcome::StoreEmpty {
            columns: vec!["pressure".to_string()]
        }
    );
}

#[test]
fn only_implausible_readings_count_as_store_empty() {
    let fx = Fixture::new("glitch.sqlite3");
    let conn = Connection::open(fx.db()).unwrap();
    conn.execute_batch(&schema_sql(TABLE)).unwrap();
    conn.execute_batch(&format!(
        "INSERT INTO {TABLE} (placa, position, pressure, temperature, _timestamp_)
         VALUES ('ABC1D23', 1, 255, 215, '2025-01-01T00:00:00'),
                ('ABC1D23', 2, 255, 215, '2025-01-01T00:00:00');"
    ))
    .unwrap();
    drop(conn);

    let report = fx
        .gateway()
        .run(
            &fx.bounder(),
            &format!("SELECT * FROM {TABLE} WHERE pressure < 100"),
        )
        .unwrap();
    assert_eq!(report.outcome.label(), "store_empty");
}

#[test]
fn payload_cap_truncates_but_reports_total() {
    let (mut fx, seed) = Fixture::seeded();
    fx.config.query.max_payload_rows = 10;
    let report = fx
        .gateway()
        .run(&fx.bounder(), &format!("SELECT id, pressure FROM {TABLE}"))
        .unwrap();
    match report.outcome {
        GatewayOutcome::Rows {
            rows,
            truncated,
            total_rows,
        } => {
            assert_eq!(rows.len(), 10);
            assert!(truncated);
            assert_eq!(total_rows, seed.rows);
        }
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn vocabulary_aliases_are_repaired_before_execution() {
    let (fx, _) = Fixture::seeded();
    let report = fx
        .gateway()
        .run(
            &fx.bounder(),
            &format!("SELECT pressao, temperatura FROM {TABLE} WHERE position = 1"),
        )
        .unwrap();

    let froms: Vec<&str> = report
        .query
        .rewritten_aliases
        .iter()
        .map(|r| r.from.as_str())
        .collect();
    assert_eq!(froms, vec!["pressao", "temperatura"]);
    assert_eq!(
        report.outcome.columns(),
        &["pressure".to_string(), "temperature".to_string()]
    );
}

#[test]
fn unknown_column_is_execution_error_with_effective_sql() {
    let (fx, _) = Fixture::seeded();
    let err = fx
        .gateway()
        .run(&fx.bounder(), &format!("SELECT pneu FROM {TABLE}"))
        .unwrap_err();
    match &err {
        TpmsError::QueryExecution { sql, details } => {
            let sql = sql.as_deref().unwrap();
            assert!(sql.starts_with("SELECT * FROM (SELECT pneu"), "{sql}");
            assert!(details.contains("pneu"), "{details}");
        }
        other => panic!("unexpected error: {other}"),
    }

    let events = fx.audit_events();
    let last = events.last().unwrap();
    assert_eq!(last["event"], "query_failed");
    assert_eq!(last["error_code"], "TPM-2201");
}

#[test]
fn write_statements_never_reach_the_store() {
    let (fx, seed) = Fixture::seeded();
    let gateway = fx.gateway();
    for candidate in [
        format!("DELETE FROM {TABLE}"),
        format!("DROP TABLE {TABLE}"),
        format!("SELECT 1; DELETE FROM {TABLE}"),
        format!("WITH x AS (SELECT 1) DELETE FROM {TABLE}"),
    ] {
        let err = gateway.run(&fx.bounder(), &candidate).unwrap_err();
        assert_eq!(err.code(), "TPM-2101", "{candidate}");
    }
    drop(gateway);
    assert_eq!(usize::try_from(count_rows(fx.db())).unwrap(), seed.rows);
}

#[test]
fn audit_trail_logs_effective_query_before_outcome() {
    let (fx, _) = Fixture::seeded();
    fx.gateway()
        .run(&fx.bounder(), &format!("SELECT * FROM {TABLE} LIMIT 99999"))
        .unwrap();

    let events = fx.audit_events();
    let names: Vec<&str> = events
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["query_bounded", "query_executed"]);
    assert_eq!(events[0]["limit_action"], "lowered");
    assert_eq!(events[0]["limit"], 50_000);
    assert!(
        events[0]["effective_sql"]
            .as_str()
            .unwrap()
            .ends_with("LIMIT 50000")
    );
    assert_eq!(events[1]["outcome"], "rows");
}

#[test]
fn fleet_wear_roll_up_over_returned_rows() {
    let (fx, seed) = Fixture::seeded();
    let report = fx
        .gateway()
        .run(&fx.bounder(), &format!("SELECT * FROM {TABLE}"))
        .unwrap();
    let rows = report.outcome.rows().unwrap();

    let extraction = ReadingExtractor::from_config(&fx.config).extract(&records(rows));
    assert_eq!(extraction.unattributed, 0);
    assert_eq!(extraction.excluded, seed.glitches);
    assert_eq!(extraction.readings.len() + extraction.excluded, seed.rows);

    let model = WearModel::from_config(&fx.config.wear);
    let summary = summarize(&model, &extraction.readings, extraction.excluded).unwrap();
    assert_eq!(summary.totals.tires, seed.tires);
    assert_eq!(summary.totals.readings, extraction.readings.len());
    assert!(summary.totals.distance_km > 0.0);
    for pair in summary.tires.windows(2) {
        assert!(pair[0].max_risk_score >= pair[1].max_risk_score);
    }
}
