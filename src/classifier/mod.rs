/// Access levels: the policy tiers a gateway can enforce.
pub mod access_level;
/// Registry of function names treated as aggregates.
pub mod function_registry;
/// Explicit-stack traversal that applies the scope rules to every nested query.
pub mod policy_engine;
/// Per-scope rules for schema-only and aggregates access.
pub mod rules;
