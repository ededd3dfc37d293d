use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::gateway::error::ConfigError;

/// Policy tier a gateway enforces, from strictest to loosest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessLevel {
    /// Only the dialect's system catalog may be read.
    SchemaOnly,
    /// Any table, but every projection must be aggregated, constant or grouped.
    Aggregates,
    /// Any read query.
    Full,
}

impl AccessLevel {
    /// Snake-case name, as echoed in validation results.
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::SchemaOnly => "schema_only",
            AccessLevel::Aggregates => "aggregates",
            AccessLevel::Full => "full",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "schema_only" | "schema-only" | "schemaonly" => Ok(AccessLevel::SchemaOnly),
            "aggregates" => Ok(AccessLevel::Aggregates),
            "full" => Ok(AccessLevel::Full),
            _ => Err(ConfigError::UnknownAccessLevel(s.to_string())),
        }
    }
}

impl Serialize for AccessLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
