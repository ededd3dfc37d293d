use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable reason code attached to every blocked query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The statement is not a read query (DML, DDL, `SELECT INTO`, locking reads, top-level `VALUES`).
    NonSelectStatement,
    /// The text could not be turned into exactly one analyzable statement.
    ParseError,
    /// Schema-only access referenced a table outside the dialect catalog.
    TableNotInSchemaAllowlist,
    /// Aggregates access projected `*` or `t.*`.
    WildcardSelectBlocked,
    /// Aggregates access projected a raw (ungrouped) column or expression.
    RawColumnNotAllowed,
    /// Aggregates access used a window function.
    WindowFunctionBlocked,
    /// Nesting exceeded a structural depth limit.
    TooComplex,
}

impl BlockReason {
    /// Every reason code, in declaration order.
    pub const ALL: [BlockReason; 7] = [
        BlockReason::NonSelectStatement,
        BlockReason::ParseError,
        BlockReason::TableNotInSchemaAllowlist,
        BlockReason::WildcardSelectBlocked,
        BlockReason::RawColumnNotAllowed,
        BlockReason::WindowFunctionBlocked,
        BlockReason::TooComplex,
    ];

    /// Snake-case code as it appears in results and audit records.
    pub fn as_str(self) -> &'static str {
        match self {
            BlockReason::NonSelectStatement => "non_select_statement",
            BlockReason::ParseError => "parse_error",
            BlockReason::TableNotInSchemaAllowlist => "table_not_in_schema_allowlist",
            BlockReason::WildcardSelectBlocked => "wildcard_select_blocked",
            BlockReason::RawColumnNotAllowed => "raw_column_not_allowed",
            BlockReason::WindowFunctionBlocked => "window_function_blocked",
            BlockReason::TooComplex => "too_complex",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
