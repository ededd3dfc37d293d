//! Dialect-aware parsing of query text into a single statement tree.

use sqlparser::parser::Parser;

use crate::catalog::dialect::Dialect;
use crate::parser::error::{ParseError, ParseResult};
use crate::parser::lower::lower_statement;
use crate::parser::tree::ParsedStatement;

/// Recursion limit handed to `sqlparser`; deeper input is reported as too complex.
pub const PARSER_RECURSION_LIMIT: usize = 50;

/// Parse `text` as exactly one statement of `dialect` and lower it.
///
/// Zero statements, several statements, grammar errors and unmodeled
/// constructs are all errors; nothing is ever partially parsed.
pub fn parse(text: &str, dialect: Dialect) -> ParseResult<ParsedStatement> {
    let sql_dialect = dialect.sql_dialect();
    let statements = Parser::new(sql_dialect.as_ref())
        .with_recursion_limit(PARSER_RECURSION_LIMIT)
        .try_with_sql(text)
        .and_then(|mut parser| parser.parse_statements())?;

    let [statement] = statements.as_slice() else {
        return Err(ParseError::StatementCount(statements.len()));
    };
    lower_statement(statement)
}
