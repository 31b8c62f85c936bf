//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use tpms_insight::core::config::Config;
use tpms_insight::core::errors::TpmsError;
use tpms_insight::gateway::demo::{DemoFleet, seed_database};
use tpms_insight::gateway::record::{ColumnMap, ReadingExtractor, records};
use tpms_insight::gateway::result::{GatewayOutcome, ResultGateway};
use tpms_insight::gateway::store::SqliteStore;
use tpms_insight::gateway::value::RowSet;
use tpms_insight::logger::jsonl::{AuditConfig, AuditEntry, AuditEvent, AuditLog, Severity};
use tpms_insight::query::bounder::{BoundedQuery, LimitAction, QueryBounder};
use tpms_insight::wear::fleet::{FleetSummary, summarize};
use tpms_insight::wear::model::{Reading, WearModel, WearResult};

/// TPMS Insight: tire wear projection and guarded telemetry queries.
#[derive(Debug, Parser)]
#[command(
    name = "tpms",
    author,
    version,
    about = "TPMS Insight - tire wear projection and guarded telemetry queries",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Project wear, fuel waste, cost and risk for one reading.
    Wear(WearArgs),
    /// Print the effective (bounded) form of a candidate query.
    Bound(BoundArgs),
    /// Bound and execute a query against the telemetry store.
    Query(QueryArgs),
    /// Fill a local SQLite store with synthetic telemetry.
    Seed(SeedArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct WearArgs {
    /// Tire pressure in PSI.
    #[arg(long, allow_negative_numbers = true, value_name = "PSI")]
    pressure: f64,
    /// Tire temperature in °C.
    #[arg(long, allow_negative_numbers = true, value_name = "CELSIUS")]
    temperature: f64,
    /// Distance travelled in km.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true, value_name = "KM")]
    distance: f64,
}

#[derive(Debug, Clone, Args)]
struct BoundArgs {
    /// Candidate SQL (`-` reads it from stdin).
    #[arg(value_name = "SQL")]
    sql: String,
}

#[derive(Debug, Clone, Args)]
struct QueryArgs {
    /// Candidate SQL (`-` reads it from stdin).
    #[arg(value_name = "SQL")]
    sql: String,
    /// Also summarize tire wear over the returned rows.
    #[arg(long)]
    wear: bool,
    /// Override the configured SQLite database.
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
    /// Do not write to the audit log.
    #[arg(long)]
    no_audit: bool,
    /// Rows to print in human mode.
    #[arg(long, default_value_t = 20, value_name = "N")]
    show: usize,
}

#[derive(Debug, Clone, Args)]
struct SeedArgs {
    /// Target database (defaults to the configured store).
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
    /// Target table (defaults to the configured table).
    #[arg(long, value_name = "NAME")]
    table: Option<String>,
    /// Number of vehicles.
    #[arg(long, default_value_t = 5, value_name = "N")]
    vehicles: usize,
    /// Tires per vehicle.
    #[arg(long, default_value_t = 6, value_name = "N")]
    tires: i64,
    /// Readings per tire.
    #[arg(long, default_value_t = 48, value_name = "N")]
    samples: usize,
    /// RNG seed.
    #[arg(long, default_value_t = 42, value_name = "SEED")]
    seed: u64,
    /// Drop and recreate the table first.
    #[arg(long)]
    replace: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
    /// Show effective-vs-default config diff.
    Diff,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

impl From<TpmsError> for CliError {
    fn from(err: TpmsError) -> Self {
        match &err {
            TpmsError::InvalidConfig { .. }
            | TpmsError::MissingConfig { .. }
            | TpmsError::ConfigParse { .. }
            | TpmsError::InvalidReading { .. }
            | TpmsError::NotAReadQuery { .. } => Self::User(err.to_string()),
            TpmsError::Serialization { .. } => Self::Internal(err.to_string()),
            TpmsError::QueryExecution { .. } | TpmsError::Io { .. } | TpmsError::Runtime { .. } => {
                Self::Runtime(err.to_string())
            }
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Wear(args) => run_wear(cli, args),
        Command::Bound(args) => run_bound(cli, args),
        Command::Query(args) => run_query(cli, args),
        Command::Seed(args) => run_seed(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

/// Report a core failure. JSON mode also gets the structured failure object on stdout.
fn fail(mode: OutputMode, command: &str, err: TpmsError) -> CliError {
    if mode == OutputMode::Json {
        let failure = match serde_json::to_value(err.to_failure()) {
            Ok(failure) => failure,
            Err(json_err) => return CliError::from(json_err),
        };
        let payload = json!({
            "command": command,
            "ok": false,
            "error": failure,
        });
        if let Err(write_err) = write_json_line(&payload) {
            return write_err;
        }
    }
    CliError::from(err)
}

fn load_config(cli: &Cli, mode: OutputMode, command: &str) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| fail(mode, command, e))
}

fn read_sql(raw: &str) -> Result<String, CliError> {
    if raw != "-" {
        return Ok(raw.to_string());
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn open_audit(config: &Config) -> AuditLog {
    let audit = AuditLog::open(AuditConfig::from_paths(&config.paths));
    let mut entry = AuditEntry::new(AuditEvent::ConfigLoaded, Severity::Info);
    match config.stable_hash() {
        Ok(hash) => entry.config_hash = Some(hash),
        Err(e) => entry = entry.with_error(&e),
    }
    entry.details = Some(config.paths.config_file.display().to_string());
    audit.record(&entry);
    audit
}

// ---------------------------------------------------------------------------
// wear
// ---------------------------------------------------------------------------

fn run_wear(cli: &Cli, args: &WearArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let config = load_config(cli, mode, "wear")?;
    let model = WearModel::from_config(&config.wear);
    let reading = Reading::new(args.pressure, args.temperature, args.distance);
    let result = model
        .evaluate(&reading)
        .map_err(|e| fail(mode, "wear", e))?;

    match mode {
        OutputMode::Human => print_wear(&result),
        OutputMode::Json => {
            let payload = json!({
                "command": "wear",
                "ok": true,
                "result": serde_json::to_value(result)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn print_wear(r: &WearResult) {
    println!("{}", "Wear projection".bold());
    println!(
        "  Reading:             {} psi, {} °C, {} km",
        r.pressure, r.temperature, r.distance
    );
    println!(
        "  Bands:               temperature {}, pressure {}",
        r.temperature_band.label(),
        r.pressure_band.label()
    );
    println!("  Subpressure:         {:.2} %", r.subpressure_percent);
    println!("  Wear factor:         {:.3}", r.wear_factor);
    println!("  Fuel penalty:        {:.3}", r.fuel_penalty_factor);
    println!("  Fuel used:           {:.3} L", r.fuel_used_liters);
    println!("  Tire life loss:      {:.2} km", r.tire_life_loss_km);
    println!("  Tire life remaining: {:.2} km", r.tire_life_remaining_km);
    println!("  Tire cost:           {:.4}", r.tire_cost_per_km);
    println!("  Fuel waste:          {:.2} L", r.fuel_waste_liters);
    println!("  Extra fuel cost:     {:.4}", r.extra_fuel_cost_per_km);
    println!("  Total cost:          {:.4}", r.total_cost_per_km);
    println!("  CO2 avoidable:       {:.2} kg", r.co2_reduction_kg);
    println!(
        "  Carbon savings:      {:.2} .. {:.2}",
        r.financial_savings_min, r.financial_savings_max
    );
    println!("  Risk score:          {:.2} (relative)", r.risk_score);
}

// ---------------------------------------------------------------------------
// bound
// ---------------------------------------------------------------------------

fn run_bound(cli: &Cli, args: &BoundArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let config = load_config(cli, mode, "bound")?;
    let sql = read_sql(&args.sql)?;
    let bounder = QueryBounder::from_config(&config.query);
    let bounded = bounder.bound(&sql).map_err(|e| fail(mode, "bound", e))?;

    match mode {
        OutputMode::Human => {
            println!("{}", bounded.effective);
            print_bound_notes(&bounded);
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "bound",
                "ok": true,
                "query": serde_json::to_value(&bounded)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn describe_limit(action: &LimitAction) -> String {
    match *action {
        LimitAction::Kept { limit } => format!("kept at {limit}"),
        LimitAction::Raised { from, to } => format!("raised from {from} to {to}"),
        LimitAction::Lowered { from, to } => format!("lowered from {from} to {to}"),
        LimitAction::Wrapped { limit } => format!("wrapped with LIMIT {limit}"),
    }
}

fn print_bound_notes(bounded: &BoundedQuery) {
    println!("  Limit: {}", describe_limit(&bounded.limit));
    for rewrite in &bounded.rewritten_aliases {
        println!("  Alias: {} -> {}", rewrite.from, rewrite.to);
    }
}

// ---------------------------------------------------------------------------
// query
// ---------------------------------------------------------------------------

fn run_query(cli: &Cli, args: &QueryArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let mut config = load_config(cli, mode, "query")?;
    if let Some(database) = &args.database {
        config.store.database.clone_from(database);
    }
    let sql = read_sql(&args.sql)?;
    let bounder = QueryBounder::from_config(&config.query);

    // Reject non-read input before touching the store.
    bounder.bound(&sql).map_err(|e| fail(mode, "query", e))?;

    let audit = if args.no_audit {
        AuditLog::disabled()
    } else {
        open_audit(&config)
    };
    let store = SqliteStore::open(&config.store).map_err(|e| fail(mode, "query", e))?;
    let gateway = ResultGateway::new(store, &config, audit);
    let report = gateway
        .run(&bounder, &sql)
        .map_err(|e| fail(mode, "query", e))?;

    let fleet = if args.wear {
        match report.outcome.rows() {
            Some(rows) => Some(fleet_summary(&config, rows)?),
            None => None,
        }
    } else {
        None
    };

    match mode {
        OutputMode::Human => {
            print_bound_notes(&report.query);
            print_outcome(&report.outcome, args.show);
            println!("  Duration: {} ms", report.duration_ms);
            if let Some((summary, _)) = &fleet {
                print_fleet(summary, args.show);
            }
        }
        OutputMode::Json => {
            let mut payload = json!({
                "command": "query",
                "ok": true,
                "report": serde_json::to_value(&report)?,
            });
            if let Some((summary, unattributed)) = &fleet {
                payload["wear"] = serde_json::to_value(summary)?;
                payload["wear"]["unattributed_rows"] = json!(unattributed);
            }
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

/// Fleet summary over the returned rows, plus the count of rows with no tire identity.
fn fleet_summary(config: &Config, rows: &RowSet) -> Result<(FleetSummary, usize), CliError> {
    if !ColumnMap::resolve(&rows.columns).supports_readings() {
        return Err(CliError::User(
            "--wear needs pressure, temperature, position and placa or imei in the projection"
                .to_string(),
        ));
    }
    let extraction = ReadingExtractor::from_config(config).extract(&records(rows));
    let model = WearModel::from_config(&config.wear);
    let summary = summarize(&model, &extraction.readings, extraction.excluded)?;
    Ok((summary, extraction.unattributed))
}

fn print_outcome(outcome: &GatewayOutcome, show: usize) {
    match outcome {
        GatewayOutcome::Rows {
            rows,
            truncated,
            total_rows,
        } => {
            print_rows(rows, show);
            if *truncated {
                println!(
                    "  {} of {total_rows} rows kept (payload cap)",
                    rows.len()
                );
            }
        }
        GatewayOutcome::CriteriaTooNarrow {
            probe_rows, sample, ..
        } => {
            println!("{}", "No rows matched these filters.".yellow());
            println!("  The store does hold valid readings ({probe_rows} sampled).");
            if !sample.vehicles.is_empty() {
                println!("  Vehicles seen: {}", sample.vehicles.join(", "));
            }
            if !sample.positions.is_empty() {
                let positions: Vec<String> =
                    sample.positions.iter().map(ToString::to_string).collect();
                println!("  Positions seen: {}", positions.join(", "));
            }
        }
        GatewayOutcome::StoreEmpty { .. } => {
            println!(
                "{}",
                "No rows matched, and the store holds no valid readings.".yellow()
            );
        }
        GatewayOutcome::Unverified { reason, .. } => {
            println!("{}", "No rows matched.".yellow());
            println!("  Could not check whether the store has data: {reason}");
        }
    }
}

fn print_rows(rows: &RowSet, show: usize) {
    let shown = rows.len().min(show);
    let cells: Vec<Vec<String>> = rows
        .rows
        .iter()
        .take(shown)
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();
    let mut widths: Vec<usize> = rows.columns.iter().map(String::len).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let pad = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}", width = *width))
            .collect::<Vec<_>>()
            .join("  ")
    };
    println!("{}", pad(&rows.columns).bold());
    for row in &cells {
        println!("{}", pad(row));
    }
    if rows.len() > shown {
        println!("  ... {} more rows (--json prints all)", rows.len() - shown);
    }
}

fn print_fleet(summary: &FleetSummary, show: usize) {
    let t = &summary.totals;
    println!();
    println!("{}", "Fleet wear summary".bold());
    println!(
        "  Tires: {}  Readings: {}  Excluded: {}",
        t.tires, t.readings, t.excluded_readings
    );
    println!("  Distance:        {:.2} km", t.distance_km);
    println!("  Tire life loss:  {:.2} km", t.tire_life_loss_km);
    println!("  Tire cost:       {:.2}", t.tire_cost);
    println!("  Fuel waste:      {:.2} L", t.fuel_waste_liters);
    println!("  Extra fuel cost: {:.2}", t.extra_fuel_cost);
    println!("  Total cost:      {:.2}", t.total_cost);
    println!("  CO2 avoidable:   {:.2} kg", t.co2_reduction_kg);
    println!("  Mean risk:       {:.2}", t.mean_risk_score);

    if summary.tires.is_empty() {
        return;
    }
    println!();
    println!(
        "  {:<16} {:>8} {:>12} {:>12} {:>9}  bands",
        "tire", "readings", "distance", "total cost", "max risk"
    );
    for tire in summary.tires.iter().take(show) {
        let key = format!("{}#{}", tire.vehicle, tire.position);
        let line = format!(
            "  {:<16} {:>8} {:>12.2} {:>12.2} {:>9.2}  {}/{}",
            key,
            tire.readings,
            tire.distance_km,
            tire.total_cost,
            tire.max_risk_score,
            tire.worst_temperature_band.label(),
            tire.worst_pressure_band.label(),
        );
        if tire.max_risk_score >= 100.0 {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
}

// ---------------------------------------------------------------------------
// seed
// ---------------------------------------------------------------------------

fn run_seed(cli: &Cli, args: &SeedArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let config = load_config(cli, mode, "seed")?;
    let database = args
        .database
        .clone()
        .unwrap_or_else(|| config.store.database.clone());
    let table = args
        .table
        .clone()
        .unwrap_or_else(|| config.store.table.clone());
    let fleet = DemoFleet {
        vehicles: args.vehicles,
        tires_per_vehicle: args.tires,
        samples_per_tire: args.samples,
        seed: args.seed,
        replace: args.replace,
    };
    let summary = seed_database(&database, &table, &fleet).map_err(|e| fail(mode, "seed", e))?;

    match mode {
        OutputMode::Human => {
            println!(
                "Seeded {} rows into {}.{}",
                summary.rows, summary.database, summary.table
            );
            println!(
                "  {} vehicles, {} tires, {} sensor glitches",
                summary.vehicles, summary.tires, summary.glitches
            );
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "seed",
                "ok": true,
                "summary": serde_json::to_value(&summary)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let mode = output_mode(cli);
            let config = load_config(cli, mode, "config show")?;

            match mode {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": serde_json::to_value(e.to_failure())?,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
        Some(ConfigCommand::Diff) => {
            let mode = output_mode(cli);
            let mut effective = load_config(cli, mode, "config diff")?;
            let defaults = Config::default();
            // The source path is not a setting.
            effective.paths.config_file.clone_from(&defaults.paths.config_file);

            match mode {
                OutputMode::Human => {
                    if effective == defaults {
                        println!("No differences from defaults.");
                    } else {
                        let eff_json = serde_json::to_value(&effective)?;
                        let def_json = serde_json::to_value(&defaults)?;

                        println!("--- defaults");
                        println!("+++ effective");
                        println!();
                        print_json_diff("", &def_json, &eff_json);
                    }
                }
                OutputMode::Json => {
                    let eff_value = serde_json::to_value(&effective)?;
                    let def_value = serde_json::to_value(&defaults)?;
                    let payload = json!({
                        "command": "config diff",
                        "has_differences": effective != defaults,
                        "effective": eff_value,
                        "defaults": def_value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
    }
}

fn print_json_diff(prefix: &str, default: &Value, effective: &Value) {
    match (default, effective) {
        (Value::Object(def_map), Value::Object(eff_map)) => {
            let mut all_keys: Vec<&String> = def_map.keys().chain(eff_map.keys()).collect();
            all_keys.sort();
            all_keys.dedup();

            for key in all_keys {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };

                match (def_map.get(key), eff_map.get(key)) {
                    (Some(d), Some(e)) if d != e => print_json_diff(&path, d, e),
                    (Some(d), None) => println!("- {path}: {d}"),
                    (None, Some(e)) => println!("+ {path}: {e}"),
                    _ => {}
                }
            }
        }
        _ => {
            if default != effective {
                println!("- {prefix}: {default}");
                println!("+ {prefix}: {effective}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// output
// ---------------------------------------------------------------------------

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("TPMS_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
