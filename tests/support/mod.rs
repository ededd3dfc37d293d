#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use sqlgate::gateway::audit::{AuditLogger, AuditRecord, Metadata};
use sqlgate::gateway::error::AuditError;
use sqlgate::gateway::facade::QueryGateway;
use sqlgate::output::reason::BlockReason;
use sqlgate::output::validation_result::ValidationResult;

pub(crate) fn gateway(access_level: &str, dialect: &str) -> QueryGateway {
    QueryGateway::from_strs(access_level, dialect).expect("test gateway settings should be valid")
}

pub(crate) fn verdict(result: &ValidationResult) -> (bool, Option<BlockReason>) {
    (result.allowed, result.reason)
}

pub(crate) fn assert_allowed(gateway: &QueryGateway, query: &str) {
    let result = gateway.validate_query_sync(query);
    assert!(
        result.allowed,
        "expected `{query}` to be allowed under {} / {}, got {:?}: {:?}",
        gateway.access_level(),
        gateway.dialect(),
        result.reason,
        result.detail,
    );
    assert_eq!(result.reason, None);
}

pub(crate) fn assert_blocked(gateway: &QueryGateway, query: &str, reason: BlockReason) {
    let result = gateway.validate_query_sync(query);
    assert!(
        !result.allowed,
        "expected `{query}` to be blocked under {} / {}",
        gateway.access_level(),
        gateway.dialect(),
    );
    assert_eq!(
        result.reason,
        Some(reason),
        "wrong reason for `{query}` (detail: {:?})",
        result.detail
    );
}

pub(crate) fn metadata(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), serde_json::Value::from(*value)))
        .collect()
}

// ---- Fixture corpus ----

/// One expected verdict from `tests/fixtures/verdicts.json`.
#[derive(Debug, Deserialize)]
pub(crate) struct VerdictCase {
    pub name: String,
    pub dialect: String,
    pub access_level: String,
    pub query: String,
    pub allowed: bool,
    #[serde(default)]
    pub reason: Option<BlockReason>,
}

pub(crate) fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(name)
}

pub(crate) fn load_verdict_cases() -> Vec<VerdictCase> {
    let json = std::fs::read_to_string(fixture_path("verdicts.json"))
        .expect("verdict fixture should be readable");
    serde_json::from_str(&json).expect("verdict fixture should parse")
}

// ---- Audit hooks ----

/// Records every audit call.
#[derive(Debug, Default)]
pub(crate) struct RecordingAuditLogger {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditLogger {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("records lock").clone()
    }
}

#[async_trait]
impl AuditLogger for RecordingAuditLogger {
    async fn log_query(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.lock().expect("records lock").push(record);
        Ok(())
    }
}

/// Counts calls, then fails.
#[derive(Debug, Default)]
pub(crate) struct FailingAuditLogger {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AuditLogger for FailingAuditLogger {
    async fn log_query(&self, _record: AuditRecord) -> Result<(), AuditError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AuditError::Sink("audit store unavailable".to_string()))
    }
}

/// Panics on every call.
#[derive(Debug, Default)]
pub(crate) struct PanickingAuditLogger;

#[async_trait]
impl AuditLogger for PanickingAuditLogger {
    async fn log_query(&self, _record: AuditRecord) -> Result<(), AuditError> {
        panic!("audit hook exploded");
    }
}

/// Waits before recording, to observe hooks that outlive their caller.
#[derive(Debug)]
pub(crate) struct SlowAuditLogger {
    pub delay: Duration,
    pub inner: Arc<RecordingAuditLogger>,
}

#[async_trait]
impl AuditLogger for SlowAuditLogger {
    async fn log_query(&self, record: AuditRecord) -> Result<(), AuditError> {
        tokio::time::sleep(self.delay).await;
        self.inner.log_query(record).await
    }
}
