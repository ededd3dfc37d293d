use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::catalog::dialect::Dialect;
use crate::classifier::access_level::AccessLevel;
use crate::classifier::policy_engine::PolicyEngine;
use crate::gateway::audit::{AuditLogger, AuditRecord, Metadata};
use crate::gateway::config::GatewayConfig;
use crate::gateway::error::{AuditError, ConfigError};
use crate::output::reason::BlockReason;
use crate::output::validation_result::ValidationResult;
use crate::parser::comments::strip_comments_for;
use crate::parser::sql_parser::parse;

/// Static query firewall for one access level and one dialect.
///
/// Configuration is fixed at construction, so a gateway can be shared
/// between tasks behind an `Arc` without locking.
pub struct QueryGateway {
    engine: PolicyEngine,
    audit_logger: Option<Arc<dyn AuditLogger>>,
}

impl QueryGateway {
    /// Gateway with the built-in aggregate list and no audit hook.
    pub fn new(access_level: AccessLevel, dialect: Dialect) -> Self {
        Self::from_config(GatewayConfig::new(access_level, dialect))
    }

    /// Gateway from a loaded configuration.
    pub fn from_config(config: GatewayConfig) -> Self {
        let registry = config.registry();
        Self {
            engine: PolicyEngine::with_registry(config.access_level, config.dialect, registry),
            audit_logger: None,
        }
    }

    /// Gateway from string settings; unknown names are configuration errors.
    pub fn from_strs(access_level: &str, dialect: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_config(GatewayConfig::from_strs(
            access_level,
            dialect,
        )?))
    }

    /// Attach an audit hook, called once per [`validate_query`](Self::validate_query).
    pub fn with_audit_logger(mut self, logger: Arc<dyn AuditLogger>) -> Self {
        self.audit_logger = Some(logger);
        self
    }

    /// Configured access level.
    pub fn access_level(&self) -> AccessLevel {
        self.engine.access_level
    }

    /// Configured dialect.
    pub fn dialect(&self) -> Dialect {
        self.engine.dialect
    }

    /// Validate `query` without invoking the audit hook.
    pub fn validate_query_sync(&self, query: &str) -> ValidationResult {
        let access_level = self.access_level();
        let dialect = self.dialect();

        let stripped = strip_comments_for(query, dialect);
        let result = match parse(&stripped, dialect) {
            Ok(statement) => self.engine.validate(&statement, query),
            Err(e) => {
                warn!(dialect = %dialect, error = %e, "Query rejected by parser");
                ValidationResult::blocked(query, access_level, dialect, e.reason(), e.to_string())
            }
        };

        debug!(
            access_level = %access_level,
            dialect = %dialect,
            allowed = result.allowed,
            reason = result.reason.map_or("none", BlockReason::as_str),
            "Query validated"
        );
        result
    }

    /// Validate `query`, then hand the verdict to the audit hook exactly once.
    ///
    /// The verdict is the same one [`validate_query_sync`](Self::validate_query_sync)
    /// returns; hook failures are logged and otherwise ignored.
    pub async fn validate_query(&self, query: &str, metadata: Metadata) -> ValidationResult {
        let result = self.validate_query_sync(query);
        if let Some(logger) = &self.audit_logger {
            let record = AuditRecord::from_result(&result, metadata);
            if let Err(e) = dispatch_audit(Arc::clone(logger), record).await {
                error!(error = %e, allowed = result.allowed, "Audit hook failed");
            }
        }
        result
    }
}

impl fmt::Debug for QueryGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryGateway")
            .field("access_level", &self.access_level())
            .field("dialect", &self.dialect())
            .field("audit_logger", &self.audit_logger.is_some())
            .finish()
    }
}

/// Run the hook on its own task when a tokio runtime is available, so
/// dropping the caller's future does not cancel it; otherwise run it inline.
async fn dispatch_audit(
    logger: Arc<dyn AuditLogger>,
    record: AuditRecord,
) -> Result<(), AuditError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle
            .spawn(async move { logger.log_query(record).await })
            .await
            .map_err(|e| AuditError::Aborted(e.to_string()))?,
        Err(_) => logger.log_query(record).await,
    }
}
