/// Audit hook capability and the built-in hooks.
pub mod audit;
/// Construction configuration.
pub mod config;
/// Configuration and audit error types.
pub mod error;
/// The `QueryGateway` facade: preprocess, parse, enforce, audit.
pub mod facade;
