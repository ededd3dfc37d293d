use serde::Serialize;

use crate::catalog::dialect::Dialect;
use crate::classifier::access_level::AccessLevel;
use crate::output::reason::BlockReason;

/// Verdict for one query.
///
/// `reason` is present exactly when `allowed` is false. `query` echoes the
/// caller's text byte for byte, comments included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Whether the query may be forwarded to the database.
    pub allowed: bool,
    /// Why the query was blocked.
    pub reason: Option<BlockReason>,
    /// Diagnostic text for a blocked query (offending table, parser message, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The query text as submitted.
    pub query: String,
    /// Access level the query was judged under.
    pub access_level: AccessLevel,
    /// Dialect the query was parsed as.
    pub dialect: Dialect,
}

impl ValidationResult {
    /// An allowed verdict.
    pub fn allowed(query: impl Into<String>, access_level: AccessLevel, dialect: Dialect) -> Self {
        Self {
            allowed: true,
            reason: None,
            detail: None,
            query: query.into(),
            access_level,
            dialect,
        }
    }

    /// A blocked verdict with its reason and diagnostic detail.
    pub fn blocked(
        query: impl Into<String>,
        access_level: AccessLevel,
        dialect: Dialect,
        reason: BlockReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            detail: Some(detail.into()),
            query: query.into(),
            access_level,
            dialect,
        }
    }
}
