/// Comment stripping with dialect-aware quoting rules.
pub mod comments;
/// Parse adapter error types.
pub mod error;
/// Shape helpers over the `sqlparser` AST (function arguments, join predicates).
pub mod expr;
/// Lowering from the `sqlparser` AST to the statement tree.
pub mod lower;
/// Quote-aware identifiers and the case rules dialects compare them by.
pub mod names;
/// Dialect-aware parsing of query text into a single statement tree.
pub mod sql_parser;
/// Statement tree consumed by the policy engine.
pub mod tree;
