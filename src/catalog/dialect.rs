use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlparser::dialect::{
    ClickHouseDialect, DatabricksDialect, Dialect as SqlDialect, MySqlDialect, PostgreSqlDialect,
    SQLiteDialect,
};
use std::fmt;

use crate::gateway::error::ConfigError;
use crate::parser::names::IdentifierCase;

/// SQL dialect a query is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `PostgreSQL` (also accepted as `postgres`).
    PostgreSql,
    /// `MySQL`.
    MySql,
    /// Databricks SQL.
    Databricks,
    /// `ClickHouse`.
    ClickHouse,
    /// `SQLite`.
    Sqlite,
}

impl Dialect {
    /// Every supported dialect, in declaration order.
    pub const ALL: [Dialect; 5] = [
        Dialect::PostgreSql,
        Dialect::MySql,
        Dialect::Databricks,
        Dialect::ClickHouse,
        Dialect::Sqlite,
    ];

    /// Canonical lowercase name, as echoed in validation results.
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::PostgreSql => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::Databricks => "databricks",
            Dialect::ClickHouse => "clickhouse",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// The `sqlparser` dialect used to parse queries for this dialect.
    pub fn sql_dialect(self) -> Box<dyn SqlDialect> {
        match self {
            Dialect::PostgreSql => Box::new(PostgreSqlDialect {}),
            Dialect::MySql => Box::new(MySqlDialect {}),
            Dialect::Databricks => Box::new(DatabricksDialect {}),
            Dialect::ClickHouse => Box::new(ClickHouseDialect {}),
            Dialect::Sqlite => Box::new(SQLiteDialect {}),
        }
    }

    /// How the server matches relation and CTE names.
    ///
    /// MySQL table names follow the host filesystem, so they are taken as
    /// case-sensitive.
    pub fn identifier_case(self) -> IdentifierCase {
        match self {
            Dialect::PostgreSql => IdentifierCase::FoldUnquoted,
            Dialect::MySql | Dialect::ClickHouse => IdentifierCase::Sensitive,
            Dialect::Databricks | Dialect::Sqlite => IdentifierCase::Insensitive,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dialect {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Dialect::PostgreSql),
            "mysql" => Ok(Dialect::MySql),
            "databricks" => Ok(Dialect::Databricks),
            "clickhouse" => Ok(Dialect::ClickHouse),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(ConfigError::UnknownDialect(s.to_string())),
        }
    }
}

impl Serialize for Dialect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Dialect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn dialect_parsing_is_case_insensitive_and_accepts_postgres_alias() {
        assert_eq!(Dialect::from_str("postgres").unwrap(), Dialect::PostgreSql);
        assert_eq!(Dialect::from_str("PostgreSQL").unwrap(), Dialect::PostgreSql);
        assert_eq!(Dialect::from_str("MYSQL").unwrap(), Dialect::MySql);
        assert_eq!(Dialect::from_str("Databricks").unwrap(), Dialect::Databricks);
        assert_eq!(Dialect::from_str("clickHouse").unwrap(), Dialect::ClickHouse);
        assert_eq!(Dialect::from_str(" sqlite ").unwrap(), Dialect::Sqlite);
    }

    #[test]
    fn unknown_dialect_is_a_configuration_error() {
        let err = Dialect::from_str("oracle").expect_err("oracle is not supported");
        assert!(matches!(err, ConfigError::UnknownDialect(ref name) if name == "oracle"));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn only_postgresql_distinguishes_quoted_case() {
        assert_eq!(Dialect::PostgreSql.identifier_case(), IdentifierCase::FoldUnquoted);
        assert_eq!(Dialect::ClickHouse.identifier_case(), IdentifierCase::Sensitive);
        assert_eq!(Dialect::Sqlite.identifier_case(), IdentifierCase::Insensitive);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for dialect in Dialect::ALL {
            assert_eq!(Dialect::from_str(&dialect.to_string()).unwrap(), dialect);
        }
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&Dialect::PostgreSql).unwrap();
        assert_eq!(json, r#""postgresql""#);
        let parsed: Dialect = serde_json::from_str(r#""postgres""#).unwrap();
        assert_eq!(parsed, Dialect::PostgreSql);
        assert!(serde_json::from_str::<Dialect>(r#""db2""#).is_err());
    }
}
