//! TPM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TpmsError>;

/// Top-level error type for the TPMS query and wear core.
#[derive(Debug, Error)]
pub enum TpmsError {
    #[error("[TPM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TPM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TPM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TPM-2001] invalid reading: {details}")]
    InvalidReading { details: String },

    #[error("[TPM-2101] not a read query: {reason}")]
    NotAReadQuery { reason: String },

    #[error("[TPM-2201] query execution failed: {details}")]
    QueryExecution {
        /// Effective SQL that was sent to the store, when known.
        sql: Option<String>,
        details: String,
    },

    #[error("[TPM-2301] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[TPM-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TPM-3900] runtime failure: {details}")]
    Runtime { details: String },
}

/// Structured failure object handed across the core boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub code: &'static str,
    pub kind: &'static str,
    pub message: String,
}

impl TpmsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TPM-1001",
            Self::MissingConfig { .. } => "TPM-1002",
            Self::ConfigParse { .. } => "TPM-1003",
            Self::InvalidReading { .. } => "TPM-2001",
            Self::NotAReadQuery { .. } => "TPM-2101",
            Self::QueryExecution { .. } => "TPM-2201",
            Self::Serialization { .. } => "TPM-2301",
            Self::Io { .. } => "TPM-3002",
            Self::Runtime { .. } => "TPM-3900",
        }
    }

    /// Taxonomy name of the failure.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "invalid_config",
            Self::MissingConfig { .. } => "missing_config",
            Self::ConfigParse { .. } => "config_parse",
            Self::InvalidReading { .. } => "invalid_reading",
            Self::NotAReadQuery { .. } => "not_a_read_query",
            Self::QueryExecution { .. } => "query_execution_error",
            Self::Serialization { .. } => "serialization",
            Self::Io { .. } => "io",
            Self::Runtime { .. } => "runtime",
        }
    }

    /// Whether a caller-level retry might resolve the failure.
    ///
    /// The core itself never retries; each execution is a single attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::QueryExecution { .. } | Self::Io { .. } | Self::Runtime { .. }
        )
    }

    /// Structured failure object carrying kind and human-readable cause.
    #[must_use]
    pub fn to_failure(&self) -> Failure {
        Failure {
            code: self.code(),
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Attach the effective SQL to a query execution failure.
    #[must_use]
    pub fn with_sql(self, effective_sql: &str) -> Self {
        match self {
            Self::QueryExecution { details, .. } => Self::QueryExecution {
                sql: Some(effective_sql.to_string()),
                details,
            },
            other => other,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for TpmsError {
    fn from(value: rusqlite::Error) -> Self {
        Self::QueryExecution {
            sql: None,
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for TpmsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TpmsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
