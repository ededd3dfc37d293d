use serde::{Deserialize, Serialize};

use crate::catalog::dialect::Dialect;
use crate::classifier::access_level::AccessLevel;
use crate::classifier::function_registry::FunctionRegistry;
use crate::gateway::error::ConfigError;

/// Immutable gateway configuration.
///
/// ```json
/// { "access_level": "aggregates", "dialect": "postgres", "extra_aggregates": ["median"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Policy tier to enforce.
    pub access_level: AccessLevel,
    /// Dialect queries are written in.
    pub dialect: Dialect,
    /// Additional function names to treat as aggregates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_aggregates: Vec<String>,
}

impl GatewayConfig {
    /// Configuration with the built-in aggregate list.
    pub fn new(access_level: AccessLevel, dialect: Dialect) -> Self {
        Self {
            access_level,
            dialect,
            extra_aggregates: Vec::new(),
        }
    }

    /// Parse both settings from their string spellings.
    pub fn from_strs(access_level: &str, dialect: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(access_level.parse()?, dialect.parse()?))
    }

    /// Load a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Aggregate registry: the built-ins plus `extra_aggregates`.
    pub fn registry(&self) -> FunctionRegistry {
        let mut registry = FunctionRegistry::builtin();
        for name in &self.extra_aggregates {
            registry.register(name);
        }
        registry
    }
}
