//! Gateway error types

use thiserror::Error;

/// Construction-time configuration errors. A gateway is never built from a
/// configuration that produced one of these.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Dialect name not recognized.
    #[error("unknown dialect `{0}` (expected postgresql, mysql, databricks, clickhouse or sqlite)")]
    UnknownDialect(String),

    /// Access level name not recognized.
    #[error("unknown access level `{0}` (expected schema_only, aggregates or full)")]
    UnknownAccessLevel(String),

    /// Malformed configuration document.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by an audit hook. Logged, never surfaced to the caller.
#[derive(Error, Debug)]
pub enum AuditError {
    /// The audit sink rejected or could not encode the record.
    #[error("audit sink error: {0}")]
    Sink(String),

    /// I/O error while writing the record.
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The hook task panicked or was cancelled by its runtime.
    #[error("audit hook aborted: {0}")]
    Aborted(String),
}
