//! JSONL audit log: one self-contained JSON object per line.
//!
//! Every candidate, the effective query actually sent to the store, and the
//! outcome of each execution are recorded here. Lines are assembled in memory
//! and written with a single `write_all` so a concurrent `tail -f` never sees a
//! partial record.
//!
//! Degradation chain:
//! 1. Primary file path
//! 2. Fallback path (defaults to the system temp dir)
//! 3. stderr with `[TPMS-AUDIT]` prefix
//! 4. Silent discard (a query never fails because auditing failed)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::PathsConfig;
use crate::core::errors::{Result, TpmsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    ConfigLoaded,
    QueryBounded,
    QueryExecuted,
    QueryFailed,
    FallbackProbe,
}

/// One audit line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditEntry {
    /// RFC 3339 UTC timestamp, millisecond precision.
    pub ts: String,
    pub event: Option<AuditEvent>,
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_sql: Option<String>,
    /// `kept` / `raised` / `lowered` / `wrapped`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    /// Gateway classification (`rows`, `criteria_too_narrow`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(event: AuditEvent, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event: Some(event),
            severity: Some(severity),
            ..Self::default()
        }
    }

    /// Fill `error_code` / `error_message` from a failure.
    #[must_use]
    pub fn with_error(mut self, error: &TpmsError) -> Self {
        self.error_code = Some(error.code().to_string());
        self.error_message = Some(error.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the current file would exceed this. Default: 16 MiB.
    pub max_size_bytes: u64,
    /// Rotated generations kept (`audit.jsonl.1` .. `.N`). Default: 3.
    pub max_rotated_files: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::from_paths(&PathsConfig::default())
    }
}

impl AuditConfig {
    #[must_use]
    pub fn from_paths(paths: &PathsConfig) -> Self {
        Self {
            path: paths.audit_log.clone(),
            fallback_path: Some(std::env::temp_dir().join("tpms-audit.jsonl")),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Where lines currently go.
enum Sink {
    Primary(BufWriter<File>),
    Fallback(BufWriter<File>),
    Stderr,
    Discard,
}

impl Sink {
    const fn label(&self) -> &'static str {
        match self {
            Self::Primary(_) => "normal",
            Self::Fallback(_) => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }

    fn file(&mut self) -> Option<&mut BufWriter<File>> {
        match self {
            Self::Primary(w) | Self::Fallback(w) => Some(w),
            Self::Stderr | Self::Discard => None,
        }
    }
}

/// Append-only JSONL writer with size-based rotation and fallback.
pub struct JsonlWriter {
    config: AuditConfig,
    sink: Sink,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Never fails: an unusable path degrades down the chain.
    #[must_use]
    pub fn open(config: AuditConfig) -> Self {
        let mut writer = Self {
            config,
            sink: Sink::Discard,
            bytes_written: 0,
        };
        match open_append(&writer.config.path) {
            Ok((file, size)) => {
                writer.sink = Sink::Primary(BufWriter::new(file));
                writer.bytes_written = size;
            }
            Err(_) => writer.open_fallback(),
        }
        writer
    }

    pub fn write_entry(&mut self, entry: &AuditEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[TPMS-AUDIT] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.sink.file() {
            let _ = w.flush();
        }
    }

    /// `normal`, `fallback`, `stderr` or `discard`.
    #[must_use]
    pub const fn state(&self) -> &'static str {
        self.sink.label()
    }

    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.bytes_written + len > self.config.max_size_bytes && self.sink.file().is_some() {
            self.rotate();
        }

        let written = match &mut self.sink {
            Sink::Primary(w) | Sink::Fallback(w) => w.write_all(line.as_bytes()).is_ok(),
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[TPMS-AUDIT] {line}");
                return;
            }
            Sink::Discard => return,
        };

        if written {
            self.bytes_written += len;
        } else {
            self.degrade();
            self.write_line(line);
        }
    }

    fn open_fallback(&mut self) {
        let Some(fallback) = self.config.fallback_path.clone() else {
            let _ = writeln!(
                io::stderr(),
                "[TPMS-AUDIT] audit log unavailable and no fallback configured, using stderr"
            );
            self.sink = Sink::Stderr;
            return;
        };
        match open_append(&fallback) {
            Ok((file, size)) => {
                let _ = writeln!(
                    io::stderr(),
                    "[TPMS-AUDIT] audit log unavailable, using fallback: {}",
                    fallback.display()
                );
                self.sink = Sink::Fallback(BufWriter::new(file));
                self.bytes_written = size;
            }
            Err(_) => {
                let _ = writeln!(
                    io::stderr(),
                    "[TPMS-AUDIT] audit and fallback paths both failed, using stderr"
                );
                self.sink = Sink::Stderr;
            }
        }
    }

    fn degrade(&mut self) {
        let previous = std::mem::replace(&mut self.sink, Sink::Discard);
        match previous {
            Sink::Primary(_) => self.open_fallback(),
            Sink::Fallback(_) => {
                let _ = writeln!(io::stderr(), "[TPMS-AUDIT] fallback write failed, using stderr");
                self.sink = Sink::Stderr;
            }
            Sink::Stderr | Sink::Discard => {}
        }
    }

    fn rotate(&mut self) {
        self.flush();
        let base = match &self.sink {
            Sink::Primary(_) => self.config.path.clone(),
            Sink::Fallback(_) => match &self.config.fallback_path {
                Some(path) => path.clone(),
                None => return,
            },
            Sink::Stderr | Sink::Discard => return,
        };
        let was_primary = matches!(self.sink, Sink::Primary(_));
        // Release the handle before renaming underneath it.
        self.sink = Sink::Discard;

        let keep = self.config.max_rotated_files.max(1);
        let _ = fs::remove_file(rotated_name(&base, keep));
        for generation in (1..keep).rev() {
            let _ = rename(rotated_name(&base, generation), rotated_name(&base, generation + 1));
        }
        let _ = rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                let writer = BufWriter::new(file);
                self.sink = if was_primary {
                    Sink::Primary(writer)
                } else {
                    Sink::Fallback(writer)
                };
                self.bytes_written = 0;
            }
            Err(_) if was_primary => self.open_fallback(),
            Err(_) => self.sink = Sink::Stderr,
        }
    }
}

/// Cheaply cloneable audit handle. A disabled handle drops every entry.
#[derive(Clone, Default)]
pub struct AuditLog {
    inner: Option<Arc<Mutex<JsonlWriter>>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("state", &self.state())
            .finish()
    }
}

impl AuditLog {
    #[must_use]
    pub fn open(config: AuditConfig) -> Self {
        Self {
            inner: Some(Arc::new(Mutex::new(JsonlWriter::open(config)))),
        }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self { inner: None }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Append and flush one entry.
    pub fn record(&self, entry: &AuditEntry) {
        if let Some(inner) = &self.inner {
            let mut writer = inner.lock();
            writer.write_entry(entry);
            writer.flush();
        }
    }

    #[must_use]
    pub fn state(&self) -> &'static str {
        self.inner
            .as_ref()
            .map_or("disabled", |inner| inner.lock().state())
    }
}

fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| TpmsError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TpmsError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `audit.jsonl` → `audit.jsonl.2`.
fn rotated_name(base: &Path, generation: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
