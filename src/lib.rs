//! Static SQL query firewall: decide, without executing anything, whether a
//! query may be forwarded to a database under a configured access level.
#![warn(missing_docs)]

/// Dialects and their system-catalog allow-lists.
pub mod catalog;
/// Access levels, the aggregate registry and the recursive policy engine.
pub mod classifier;
/// The `QueryGateway` facade, its configuration and the audit hook.
pub mod gateway;
/// Reason codes and validation results.
pub mod output;
/// Comment stripping, parsing and lowering into the statement tree.
pub mod parser;
