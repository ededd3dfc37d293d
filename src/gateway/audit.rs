//! Audit hook capability.
//!
//! The gateway hands every verdict from its suspending entry point to an
//! [`AuditLogger`] exactly once. Hook failures are logged by the gateway and
//! never change the verdict.

use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use crate::catalog::dialect::Dialect;
use crate::classifier::access_level::AccessLevel;
use crate::gateway::error::AuditError;
use crate::output::reason::BlockReason;
use crate::output::validation_result::ValidationResult;

/// Caller-supplied context forwarded to the audit hook untouched.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// What the audit hook receives for one validated query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    /// The query text as submitted.
    pub query: String,
    /// Access level the query was judged under.
    pub access_level: AccessLevel,
    /// Dialect the query was parsed as.
    pub dialect: Dialect,
    /// The verdict.
    pub allowed: bool,
    /// Reason code when blocked.
    pub reason: Option<BlockReason>,
    /// Caller metadata.
    pub metadata: Metadata,
}

impl AuditRecord {
    /// Build the record for `result`.
    pub fn from_result(result: &ValidationResult, metadata: Metadata) -> Self {
        Self {
            query: result.query.clone(),
            access_level: result.access_level,
            dialect: result.dialect,
            allowed: result.allowed,
            reason: result.reason,
            metadata,
        }
    }
}

/// Asynchronous audit hook.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    /// Record one validated query.
    async fn log_query(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Audit hook that completes immediately.
pub trait SyncAuditLogger: Send + Sync {
    /// Record one validated query.
    fn log_query(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Adapts a [`SyncAuditLogger`] to the [`AuditLogger`] capability.
#[derive(Debug, Default)]
pub struct BlockingAuditLogger<L> {
    inner: L,
}

impl<L> BlockingAuditLogger<L> {
    /// Wrap a synchronous hook.
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    /// The wrapped hook.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Unwrap the synchronous hook.
    pub fn into_inner(self) -> L {
        self.inner
    }
}

#[async_trait]
impl<L: SyncAuditLogger> AuditLogger for BlockingAuditLogger<L> {
    async fn log_query(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.inner.log_query(record)
    }
}

/// Emits each record as a `tracing` event at `INFO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

#[async_trait]
impl AuditLogger for TracingAuditLogger {
    async fn log_query(&self, record: AuditRecord) -> Result<(), AuditError> {
        let metadata =
            serde_json::to_string(&record.metadata).map_err(|e| AuditError::Sink(e.to_string()))?;
        info!(
            query = %record.query,
            access_level = %record.access_level,
            dialect = %record.dialect,
            allowed = record.allowed,
            reason = record.reason.map_or("none", BlockReason::as_str),
            metadata = %metadata,
            "Query audited"
        );
        Ok(())
    }
}

/// Writes each record as one JSON line to a writer.
#[derive(Debug)]
pub struct JsonLinesAuditLogger<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesAuditLogger<W> {
    /// Log to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> SyncAuditLogger for JsonLinesAuditLogger<W> {
    fn log_query(&self, record: AuditRecord) -> Result<(), AuditError> {
        let line = serde_json::to_string(&record).map_err(|e| AuditError::Sink(e.to_string()))?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(allowed: bool) -> AuditRecord {
        let result = if allowed {
            ValidationResult::allowed("SELECT 1", AccessLevel::Full, Dialect::PostgreSql)
        } else {
            ValidationResult::blocked(
                "DROP TABLE users",
                AccessLevel::Full,
                Dialect::PostgreSql,
                BlockReason::NonSelectStatement,
                "DROP statement is not a read query",
            )
        };
        let mut metadata = Metadata::new();
        metadata.insert("user".to_string(), json!("alice"));
        AuditRecord::from_result(&result, metadata)
    }

    #[test]
    fn record_copies_the_verdict() {
        let blocked = record(false);
        assert!(!blocked.allowed);
        assert_eq!(blocked.reason, Some(BlockReason::NonSelectStatement));
        assert_eq!(blocked.query, "DROP TABLE users");
        assert_eq!(blocked.metadata["user"], "alice");
    }

    #[tokio::test]
    async fn json_lines_logger_writes_one_line_per_record() {
        let logger = BlockingAuditLogger::new(JsonLinesAuditLogger::new(Vec::new()));
        logger.log_query(record(true)).await.expect("first write");
        logger.log_query(record(false)).await.expect("second write");

        let output = String::from_utf8(logger.into_inner().into_inner()).expect("utf-8 output");
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).expect("each line is JSON"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["allowed"], true);
        assert!(lines[0]["reason"].is_null());
        assert_eq!(lines[1]["reason"], "non_select_statement");
        assert_eq!(lines[1]["metadata"]["user"], "alice");
        assert_eq!(lines[1]["dialect"], "postgresql");
    }

    #[tokio::test]
    async fn tracing_logger_accepts_records() {
        TracingAuditLogger
            .log_query(record(true))
            .await
            .expect("tracing logger never fails on plain metadata");
    }
}
