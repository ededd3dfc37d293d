//! Parse adapter error types

use thiserror::Error;

use crate::output::reason::BlockReason;

/// Any failure to turn query text into a [`ParsedStatement`](crate::parser::tree::ParsedStatement).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Tokenizer or grammar error reported by `sqlparser`.
    #[error("SQL parse error: {0}")]
    Syntax(String),

    /// The text did not contain exactly one statement.
    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),

    /// The text parsed, but uses a construct the adapter does not model.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// Nesting exceeded the parser or adapter depth limit.
    #[error("query nesting exceeds the limit of {limit}")]
    NestingTooDeep {
        /// The limit that was exceeded.
        limit: usize,
    },
}

impl ParseError {
    /// Reason code reported when this error blocks a query.
    pub fn reason(&self) -> BlockReason {
        match self {
            ParseError::NestingTooDeep { .. } => BlockReason::TooComplex,
            ParseError::Syntax(_) | ParseError::StatementCount(_) | ParseError::Unsupported(_) => {
                BlockReason::ParseError
            }
        }
    }
}

/// Result type for parse adapter operations
pub type ParseResult<T> = Result<T, ParseError>;

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        match err {
            sqlparser::parser::ParserError::RecursionLimitExceeded => ParseError::NestingTooDeep {
                limit: crate::parser::sql_parser::PARSER_RECURSION_LIMIT,
            },
            other => ParseError::Syntax(other.to_string()),
        }
    }
}
