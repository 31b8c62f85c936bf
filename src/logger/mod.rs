//! Append-only JSONL audit logging with graceful degradation.

pub mod jsonl;

pub use jsonl::{AuditConfig, AuditEntry, AuditEvent, AuditLog, Severity};
