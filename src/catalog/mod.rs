/// Supported SQL dialects and their mapping onto `sqlparser` dialects.
pub mod dialect;
/// Per-dialect table of system-catalog objects allowed under schema-only access.
pub mod schema_catalog;
