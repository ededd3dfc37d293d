use crate::catalog::dialect::Dialect;
use crate::parser::names::{split_qualified_name, Identifier, IdentifierCase};

/// One allow-list pattern for schema-only access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogPattern {
    /// Any relation whose namespace (the component right before the relation) matches.
    Namespace(&'static str),
    /// An exact relation name qualified by one of `qualifiers`, or unqualified
    /// when `unqualified` is set.
    Relation {
        /// Relation name.
        name: &'static str,
        /// Namespaces that may qualify the relation.
        qualifiers: &'static [&'static str],
        /// Whether the bare relation name resolves to the catalog object.
        unqualified: bool,
    },
}

impl CatalogPattern {
    fn matches(&self, parts: &[Identifier], case: IdentifierCase) -> bool {
        let Some((relation, qualifiers)) = parts.split_last() else {
            return false;
        };
        match self {
            CatalogPattern::Namespace(namespace) => qualifiers
                .last()
                .is_some_and(|schema| case.key(schema) == *namespace),
            CatalogPattern::Relation {
                name,
                qualifiers: allowed,
                unqualified,
            } => {
                if case.key(relation) != *name {
                    return false;
                }
                match qualifiers {
                    [] => *unqualified,
                    [schema] => {
                        let schema = case.key(schema);
                        allowed.iter().any(|qualifier| *qualifier == schema)
                    }
                    _ => false,
                }
            }
        }
    }
}

/// Allow-list entry for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    /// Dialect this entry applies to.
    pub dialect: Dialect,
    /// How the server matches catalog names. Patterns are written in the
    /// form this rule produces as a key.
    pub case: IdentifierCase,
    /// Patterns that identify metadata objects.
    pub patterns: &'static [CatalogPattern],
}

const SQLITE_QUALIFIERS: &[&str] = &["main", "temp"];

const CLICKHOUSE_QUALIFIERS: &[&str] = &["system"];

const fn sqlite_relation(name: &'static str) -> CatalogPattern {
    CatalogPattern::Relation {
        name,
        qualifiers: SQLITE_QUALIFIERS,
        unqualified: true,
    }
}

const fn clickhouse_system_table(name: &'static str) -> CatalogPattern {
    CatalogPattern::Relation {
        name,
        qualifiers: CLICKHOUSE_QUALIFIERS,
        unqualified: false,
    }
}

const POSTGRESQL_PATTERNS: &[CatalogPattern] = &[
    CatalogPattern::Namespace("information_schema"),
    CatalogPattern::Namespace("pg_catalog"),
];

const MYSQL_PATTERNS: &[CatalogPattern] = &[CatalogPattern::Namespace("information_schema")];

const DATABRICKS_PATTERNS: &[CatalogPattern] = &[CatalogPattern::Namespace("information_schema")];

// `system` also holds query logs and live process lists carrying other
// sessions' query text, so only metadata tables are listed.
const CLICKHOUSE_PATTERNS: &[CatalogPattern] = &[
    CatalogPattern::Namespace("information_schema"),
    CatalogPattern::Namespace("INFORMATION_SCHEMA"),
    clickhouse_system_table("databases"),
    clickhouse_system_table("tables"),
    clickhouse_system_table("columns"),
    clickhouse_system_table("data_skipping_indices"),
    clickhouse_system_table("dictionaries"),
    clickhouse_system_table("functions"),
    clickhouse_system_table("table_functions"),
    clickhouse_system_table("table_engines"),
    clickhouse_system_table("data_type_families"),
    clickhouse_system_table("formats"),
    clickhouse_system_table("one"),
];

const SQLITE_PATTERNS: &[CatalogPattern] = &[
    sqlite_relation("sqlite_master"),
    sqlite_relation("sqlite_schema"),
    sqlite_relation("sqlite_temp_master"),
    sqlite_relation("sqlite_temp_schema"),
    sqlite_relation("pragma_table_info"),
    sqlite_relation("pragma_table_xinfo"),
    sqlite_relation("pragma_index_list"),
    sqlite_relation("pragma_index_info"),
    sqlite_relation("pragma_index_xinfo"),
    sqlite_relation("pragma_foreign_key_list"),
    sqlite_relation("pragma_database_list"),
];

/// Process-wide catalog table, one entry per dialect.
pub static DIALECT_CATALOG: [CatalogEntry; 5] = [
    CatalogEntry {
        dialect: Dialect::PostgreSql,
        case: IdentifierCase::FoldUnquoted,
        patterns: POSTGRESQL_PATTERNS,
    },
    // MySQL resolves `information_schema` case-insensitively on every platform.
    CatalogEntry {
        dialect: Dialect::MySql,
        case: IdentifierCase::Insensitive,
        patterns: MYSQL_PATTERNS,
    },
    CatalogEntry {
        dialect: Dialect::Databricks,
        case: IdentifierCase::Insensitive,
        patterns: DATABRICKS_PATTERNS,
    },
    CatalogEntry {
        dialect: Dialect::ClickHouse,
        case: IdentifierCase::Sensitive,
        patterns: CLICKHOUSE_PATTERNS,
    },
    CatalogEntry {
        dialect: Dialect::Sqlite,
        case: IdentifierCase::Insensitive,
        patterns: SQLITE_PATTERNS,
    },
];

/// Catalog entry for `dialect`.
pub fn entry_for(dialect: Dialect) -> Option<&'static CatalogEntry> {
    DIALECT_CATALOG.iter().find(|entry| entry.dialect == dialect)
}

/// Allow-list patterns for `dialect`.
pub fn patterns_for(dialect: Dialect) -> &'static [CatalogPattern] {
    entry_for(dialect)
        .map(|entry| entry.patterns)
        .unwrap_or_default()
}

/// True when the already-split name parts identify a metadata object.
pub fn parts_are_schema_only(dialect: Dialect, parts: &[Identifier]) -> bool {
    entry_for(dialect).is_some_and(|entry| {
        entry
            .patterns
            .iter()
            .any(|pattern| pattern.matches(parts, entry.case))
    })
}

/// True when `qualified_name` identifies a metadata object in `dialect`.
///
/// Quoted parts are compared the way the dialect's server compares them.
pub fn is_schema_only(dialect: Dialect, qualified_name: &str) -> bool {
    parts_are_schema_only(dialect, &split_qualified_name(qualified_name))
}
