//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TpmsError};

/// Full TPMS configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub query: QueryConfig,
    pub wear: WearConfig,
    pub store: StoreConfig,
    pub fallback: FallbackConfig,
    pub validity: ValidityConfig,
    pub paths: PathsConfig,
}

/// Row-limit window and vocabulary corrections applied to candidate SQL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    pub min_rows: u64,
    pub max_rows: u64,
    /// Second, in-memory cap on rows handed back to callers.
    pub max_payload_rows: usize,
    /// Bare-word alias → real column identifier.
    pub aliases: BTreeMap<String, String>,
}

/// Reference constants for the wear/cost simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WearConfig {
    pub ideal_pressure_psi: f64,
    pub tire_cost: f64,
    pub fuel_cost_per_liter: f64,
    pub fuel_efficiency_km_per_liter: f64,
    pub tire_life_km: f64,
    pub co2_factor_kg_per_liter: f64,
    pub carbon_price_min: f64,
    pub carbon_price_max: f64,
}

/// Telemetry store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub database: PathBuf,
    pub table: String,
    pub pool_size: usize,
    pub busy_timeout_ms: u64,
    /// Kilometres per odometer unit (the telemetry feed reports metres).
    pub odometer_km_per_unit: f64,
}

/// Shape of the diagnostic probe run when a query comes back empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FallbackConfig {
    /// LIMIT of the broadened probe query.
    pub sample_rows: u64,
    /// How many probe rows feed the discriminator sample.
    pub discriminator_window: usize,
    /// Distinct values reported per discriminating column.
    pub max_distinct: usize,
}

/// Physical plausibility window for raw sensor values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidityConfig {
    pub pressure_min: f64,
    pub pressure_max: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
}

/// Filesystem paths used by tpms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub audit_log: PathBuf,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let aliases = [
            ("temperatura", "temperature"),
            ("pressao", "pressure"),
            ("longitude", "longtitude"),
        ]
        .into_iter()
        .map(|(alias, column)| (alias.to_string(), column.to_string()))
        .collect();
        Self {
            min_rows: 10_000,
            max_rows: 50_000,
            max_payload_rows: 10_000,
            aliases,
        }
    }
}

impl Default for WearConfig {
    fn default() -> Self {
        Self {
            ideal_pressure_psi: 120.0,
            tire_cost: 2450.0,
            fuel_cost_per_liter: 6.02,
            fuel_efficiency_km_per_liter: 2.51,
            tire_life_km: 200_000.0,
            co2_factor_kg_per_liter: 2.68,
            carbon_price_min: 0.05,
            carbon_price_max: 0.15,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: data_dir().join("telemetry.sqlite3"),
            table: "tire_data_json_llm".to_string(),
            pool_size: 4,
            busy_timeout_ms: 5_000,
            odometer_km_per_unit: 0.001,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            sample_rows: 100,
            discriminator_window: 50,
            max_distinct: 5,
        }
    }
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            pressure_min: 0.0,
            pressure_max: 180.0,
            temperature_min: -273.15,
            temperature_max: 180.0,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = home_dir();
        Self {
            config_file: home_dir.join(".config").join("tpms").join("config.toml"),
            audit_log: data_dir().join("audit.jsonl"),
        }
    }
}

impl ValidityConfig {
    /// Whether a pressure/temperature pair is physically plausible.
    #[must_use]
    pub fn admits(&self, pressure: f64, temperature: f64) -> bool {
        pressure.is_finite()
            && temperature.is_finite()
            && (self.pressure_min..=self.pressure_max).contains(&pressure)
            && (self.temperature_min..=self.temperature_max).contains(&temperature)
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[TPMS-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("tpms")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| TpmsError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(TpmsError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_aliases();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the audit log.
    ///
    /// FNV-1a over the canonical JSON form so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // Legacy names first so the namespaced ones win when both are set.
        override_parsed(&mut lookup, "MIN_RESULT_LIMIT", &mut self.query.min_rows)?;
        override_parsed(&mut lookup, "RESULT_LIMIT", &mut self.query.max_rows)?;

        // query
        override_parsed(&mut lookup, "TPMS_QUERY_MIN_ROWS", &mut self.query.min_rows)?;
        override_parsed(&mut lookup, "TPMS_QUERY_MAX_ROWS", &mut self.query.max_rows)?;
        override_parsed(
            &mut lookup,
            "TPMS_QUERY_MAX_PAYLOAD_ROWS",
            &mut self.query.max_payload_rows,
        )?;

        // wear
        for (name, slot) in [
            (
                "TPMS_WEAR_IDEAL_PRESSURE_PSI",
                &mut self.wear.ideal_pressure_psi,
            ),
            ("TPMS_WEAR_TIRE_COST", &mut self.wear.tire_cost),
            (
                "TPMS_WEAR_FUEL_COST_PER_LITER",
                &mut self.wear.fuel_cost_per_liter,
            ),
            (
                "TPMS_WEAR_FUEL_EFFICIENCY_KM_PER_LITER",
                &mut self.wear.fuel_efficiency_km_per_liter,
            ),
            ("TPMS_WEAR_TIRE_LIFE_KM", &mut self.wear.tire_life_km),
            (
                "TPMS_WEAR_CO2_FACTOR_KG_PER_LITER",
                &mut self.wear.co2_factor_kg_per_liter,
            ),
            ("TPMS_WEAR_CARBON_PRICE_MIN", &mut self.wear.carbon_price_min),
            ("TPMS_WEAR_CARBON_PRICE_MAX", &mut self.wear.carbon_price_max),
        ] {
            override_parsed(&mut lookup, name, slot)?;
        }

        // store
        if let Some(raw) = lookup("TPMS_STORE_DATABASE") {
            self.store.database = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("TPMS_STORE_TABLE") {
            self.store.table = raw.trim().to_string();
        }
        override_parsed(&mut lookup, "TPMS_STORE_POOL_SIZE", &mut self.store.pool_size)?;
        override_parsed(
            &mut lookup,
            "TPMS_STORE_BUSY_TIMEOUT_MS",
            &mut self.store.busy_timeout_ms,
        )?;
        override_parsed(
            &mut lookup,
            "TPMS_STORE_ODOMETER_KM_PER_UNIT",
            &mut self.store.odometer_km_per_unit,
        )?;

        // paths
        if let Some(raw) = lookup("TPMS_PATHS_AUDIT_LOG") {
            self.paths.audit_log = PathBuf::from(raw);
        }

        Ok(())
    }

    /// Alias matching is case-insensitive; store keys lowercased.
    fn normalize_aliases(&mut self) {
        let normalized: BTreeMap<String, String> = std::mem::take(&mut self.query.aliases)
            .into_iter()
            .map(|(alias, column)| (alias.trim().to_ascii_lowercase(), column.trim().to_string()))
            .collect();
        self.query.aliases = normalized;
    }

    #[allow(clippy::too_many_lines)]
    fn validate(&self) -> Result<()> {
        if self.query.min_rows == 0 {
            return Err(TpmsError::InvalidConfig {
                details: "query.min_rows must be >= 1".to_string(),
            });
        }
        if self.query.min_rows > self.query.max_rows {
            return Err(TpmsError::InvalidConfig {
                details: format!(
                    "query.min_rows ({}) must be <= query.max_rows ({})",
                    self.query.min_rows, self.query.max_rows
                ),
            });
        }
        if self.query.max_payload_rows == 0 {
            return Err(TpmsError::InvalidConfig {
                details: "query.max_payload_rows must be >= 1".to_string(),
            });
        }
        for (alias, column) in &self.query.aliases {
            validate_identifier("query.aliases key", alias)?;
            validate_identifier("query.aliases value", column)?;
        }

        for (name, val) in [
            ("ideal_pressure_psi", self.wear.ideal_pressure_psi),
            ("tire_cost", self.wear.tire_cost),
            ("fuel_cost_per_liter", self.wear.fuel_cost_per_liter),
            (
                "fuel_efficiency_km_per_liter",
                self.wear.fuel_efficiency_km_per_liter,
            ),
            ("tire_life_km", self.wear.tire_life_km),
            ("co2_factor_kg_per_liter", self.wear.co2_factor_kg_per_liter),
            ("carbon_price_min", self.wear.carbon_price_min),
            ("carbon_price_max", self.wear.carbon_price_max),
        ] {
            if !val.is_finite() || val <= 0.0 {
                return Err(TpmsError::InvalidConfig {
                    details: format!("wear.{name} must be a finite value > 0, got {val}"),
                });
            }
        }
        if self.wear.carbon_price_min > self.wear.carbon_price_max {
            return Err(TpmsError::InvalidConfig {
                details: format!(
                    "wear.carbon_price_min ({}) must be <= wear.carbon_price_max ({})",
                    self.wear.carbon_price_min, self.wear.carbon_price_max
                ),
            });
        }

        validate_identifier("store.table", &self.store.table)?;
        if self.store.pool_size == 0 {
            return Err(TpmsError::InvalidConfig {
                details: "store.pool_size must be >= 1".to_string(),
            });
        }
        let scale = self.store.odometer_km_per_unit;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(TpmsError::InvalidConfig {
                details: format!("store.odometer_km_per_unit must be a finite value > 0, got {scale}"),
            });
        }

        if self.fallback.sample_rows == 0
            || self.fallback.discriminator_window == 0
            || self.fallback.max_distinct == 0
        {
            return Err(TpmsError::InvalidConfig {
                details: "fallback.sample_rows, discriminator_window and max_distinct must be > 0"
                    .to_string(),
            });
        }

        let v = &self.validity;
        if ![v.pressure_min, v.pressure_max, v.temperature_min, v.temperature_max]
            .iter()
            .all(|x| x.is_finite())
        {
            return Err(TpmsError::InvalidConfig {
                details: "validity bounds must be finite".to_string(),
            });
        }
        if v.pressure_min > v.pressure_max || v.temperature_min > v.temperature_max {
            return Err(TpmsError::InvalidConfig {
                details: "validity windows must satisfy min <= max".to_string(),
            });
        }

        Ok(())
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static identifier regex"))
}

/// Names that are spliced into SQL text must be bare identifiers.
pub fn validate_identifier(field: &str, value: &str) -> Result<()> {
    if identifier_pattern().is_match(value) {
        Ok(())
    } else {
        Err(TpmsError::InvalidConfig {
            details: format!("{field} must be a plain SQL identifier, got {value:?}"),
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn override_parsed<F, T>(lookup: &mut F, name: &str, slot: &mut T) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        *slot = raw
            .trim()
            .parse::<T>()
            .map_err(|error| TpmsError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, TpmsError, validate_identifier};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.query.min_rows, 10_000);
        assert_eq!(cfg.query.max_rows, 50_000);
        assert_eq!(cfg.query.max_payload_rows, 10_000);
        assert!((cfg.wear.fuel_efficiency_km_per_liter - 2.51).abs() < f64::EPSILON);
    }

    #[test]
    fn min_rows_above_max_rows_rejected() {
        let mut cfg = Config::default();
        cfg.query.min_rows = 60_000;
        let err = cfg.validate().expect_err("expected row window error");
        match err {
            TpmsError::InvalidConfig { details } => assert!(details.contains("min_rows")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_positive_wear_constants_rejected() {
        let mut cfg = Config::default();
        cfg.wear.fuel_efficiency_km_per_liter = 0.0;
        let err = cfg.validate().expect_err("zero efficiency must fail");
        assert!(err.to_string().contains("fuel_efficiency_km_per_liter"));

        let mut cfg = Config::default();
        cfg.wear.tire_cost = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_carbon_prices_rejected() {
        let mut cfg = Config::default();
        cfg.wear.carbon_price_min = 0.5;
        let err = cfg.validate().expect_err("expected carbon price error");
        assert!(err.to_string().contains("carbon_price_min"));
    }

    #[test]
    fn table_name_must_be_identifier() {
        let mut cfg = Config::default();
        cfg.store.table = "readings; DROP TABLE x".to_string();
        let err = cfg.validate().expect_err("expected identifier error");
        assert!(err.to_string().contains("store.table"));
    }

    #[test]
    fn alias_entries_must_be_identifiers() {
        let mut cfg = Config::default();
        cfg.query
            .aliases
            .insert("pressão".to_string(), "pressure".to_string());
        assert!(cfg.validate().is_err());
        assert!(validate_identifier("x", "_timestamp_").is_ok());
        assert!(validate_identifier("x", "9lives").is_err());
    }

    #[test]
    fn env_overrides_apply_row_window() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("TPMS_QUERY_MIN_ROWS", "100"),
            ("TPMS_QUERY_MAX_ROWS", "500"),
            ("TPMS_WEAR_FUEL_EFFICIENCY_KM_PER_LITER", "1.51"),
            ("TPMS_STORE_TABLE", "readings"),
        ]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("overrides should parse");
        assert_eq!(cfg.query.min_rows, 100);
        assert_eq!(cfg.query.max_rows, 500);
        assert!((cfg.wear.fuel_efficiency_km_per_liter - 1.51).abs() < f64::EPSILON);
        assert_eq!(cfg.store.table, "readings");
    }

    #[test]
    fn legacy_env_names_lose_to_namespaced_ones() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("RESULT_LIMIT", "20000"),
            ("MIN_RESULT_LIMIT", "500"),
            ("TPMS_QUERY_MIN_ROWS", "700"),
        ]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("overrides should parse");
        assert_eq!(cfg.query.max_rows, 20_000);
        assert_eq!(cfg.query.min_rows, 700);
    }

    #[test]
    fn env_invalid_number_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("TPMS_QUERY_MAX_ROWS", "lots")]);
        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid integer should fail");
        match err {
            TpmsError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("TPMS_QUERY_MAX_ROWS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn alias_keys_are_lowercased() {
        let mut cfg = Config::default();
        cfg.query
            .aliases
            .insert(" Velocidade ".to_string(), "speed".to_string());
        cfg.normalize_aliases();
        assert_eq!(
            cfg.query.aliases.get("velocidade").map(String::as_str),
            Some("speed")
        );
    }

    #[test]
    fn toml_sections_parse_with_defaults() {
        let raw = r#"
            [query]
            min_rows = 5
            max_rows = 50

            [wear]
            fuel_efficiency_km_per_liter = 1.51
        "#;
        let cfg: Config = toml::from_str(raw).expect("toml parses");
        assert_eq!(cfg.query.min_rows, 5);
        assert_eq!(cfg.query.max_payload_rows, 10_000);
        assert!((cfg.wear.ideal_pressure_psi - 120.0).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validity_window_admits_boundaries() {
        let cfg = Config::default();
        assert!(cfg.validity.admits(0.0, -273.15));
        assert!(cfg.validity.admits(180.0, 180.0));
        assert!(!cfg.validity.admits(180.1, 20.0));
        assert!(!cfg.validity.admits(100.0, 180.5));
        assert!(!cfg.validity.admits(f64::NAN, 20.0));
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/tpms/config.toml")));
        assert!(matches!(result, Err(TpmsError::MissingConfig { .. })));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store]\ntable = \"readings\"\n").unwrap();
        let cfg = Config::load(Some(&path)).expect("config loads");
        assert_eq!(cfg.store.table, "readings");
        assert_eq!(cfg.paths.config_file, PathBuf::from(&path));
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash should compute");
        let mut modified = Config::default();
        modified.query.max_rows += 1;
        let after = modified.stable_hash().expect("hash should compute");
        assert_ne!(before, after);
        assert_eq!(before, cfg.stable_hash().expect("hash"));
    }
}
