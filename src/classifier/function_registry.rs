use std::collections::HashSet;

use crate::gateway::error::ConfigError;
use crate::parser::names::{normalize_identifier, IdentifierCase};
use crate::parser::tree::QualifiedName;

/// Aggregate functions recognized in every dialect.
pub const BUILTIN_AGGREGATES: &[&str] = &[
    "count",
    "sum",
    "avg",
    "min",
    "max",
    "count_distinct",
    "countdistinct",
    "approx_count_distinct",
    "uniq",
    "uniqexact",
];

/// Registry of function names treated as row-collapsing aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRegistry {
    /// Lowercased aggregate names.
    pub aggregates: HashSet<String>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            aggregates: HashSet::new(),
        }
    }

    /// Registry holding [`BUILTIN_AGGREGATES`].
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for name in BUILTIN_AGGREGATES {
            registry.register(name);
        }
        registry
    }

    /// Load extra aggregate names from a JSON array of strings.
    pub fn load_from_json(&mut self, json: &str) -> Result<(), ConfigError> {
        let names: Vec<String> = serde_json::from_str(json)?;
        for name in names {
            self.register(&name);
        }
        Ok(())
    }

    /// Register an aggregate name; matching is case-insensitive.
    pub fn register(&mut self, name: &str) {
        self.aggregates.insert(normalize_identifier(name));
    }

    /// Check if `name` is a registered aggregate.
    ///
    /// Schema-qualified calls never match: `evil.count(x)` is a user function.
    /// A quoted name matches only its exact lowercase spelling, since
    /// `"COUNT"(x)` may name a different function.
    pub fn is_aggregate(&self, name: &QualifiedName) -> bool {
        match name.parts.as_slice() {
            [part] => self
                .aggregates
                .contains(&IdentifierCase::FoldUnquoted.key(part)),
            _ => false,
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
