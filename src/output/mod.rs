/// Stable reason codes for blocked queries.
pub mod reason;
/// The per-query verdict returned by the gateway.
pub mod validation_result;
