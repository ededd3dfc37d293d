//! Statement tree consumed by the policy engine
//!
//! These types keep only what the access rules need from the `sqlparser`
//! AST: scopes, table references, projections and the expressions that may
//! hide nested queries.

use crate::parser::names::{Identifier, IdentifierCase};

/// A possibly qualified SQL object name, one identifier per part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    /// Name components, outermost first (`catalog`, `schema`, `relation`).
    pub parts: Vec<Identifier>,
}

impl QualifiedName {
    /// Build a name from unquoted parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_identifiers(parts.into_iter().map(Identifier::new))
    }

    /// Build a name from identifiers that keep their quoting.
    pub fn from_identifiers<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Identifier>,
    {
        Self {
            parts: parts.into_iter().collect(),
        }
    }

    /// Comparison keys of every part under `case`.
    pub fn keys(&self, case: IdentifierCase) -> Vec<String> {
        self.parts.iter().map(|part| case.key(part)).collect()
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// Top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedStatement {
    /// A query (`SELECT`, set operation, `VALUES`, ...).
    Query(Query),
    /// Any other statement, labelled by its leading keyword.
    Other {
        /// Leading keyword, uppercase (e.g. `INSERT`).
        kind: String,
    },
}

/// One CTE binding from a `WITH` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CteBinding {
    /// Name the CTE is bound to.
    pub name: Identifier,
    /// CTE body.
    pub body: Query,
}

/// A query: optional CTEs, a body and trailing clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// CTE bindings in declaration order.
    pub ctes: Vec<CteBinding>,
    /// Whether the `WITH` clause was `WITH RECURSIVE`.
    pub recursive: bool,
    /// Query body.
    pub body: QueryBody,
    /// `ORDER BY` expressions.
    pub order_by: Vec<Expr>,
    /// `LIMIT` / `OFFSET` / `LIMIT BY` expressions.
    pub limit: Vec<Expr>,
    /// Whether the query carries a row-locking clause (`FOR UPDATE`, `FOR SHARE`).
    pub locking: bool,
}

/// Set operator joining the branches of a [`QueryBody::SetOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    /// `UNION`
    Union,
    /// `INTERSECT`
    Intersect,
    /// `EXCEPT` / `MINUS`
    Except,
}

/// The body of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    /// A single `SELECT`.
    Select(Box<Select>),
    /// Branches joined by the same set operator, left to right.
    SetOperation {
        /// Operator joining the branches.
        op: SetOperator,
        /// Ordered branches.
        branches: Vec<QueryBody>,
    },
    /// A parenthesized query with its own CTEs and trailing clauses.
    Nested(Box<Query>),
    /// A `VALUES` row list.
    Values(Vec<Vec<Expr>>),
    /// A data-modifying body (`INSERT`/`UPDATE`/`DELETE` in a CTE, `SELECT ... INTO`).
    Write {
        /// Label of the write, uppercase.
        kind: String,
    },
}

impl Default for QueryBody {
    fn default() -> Self {
        QueryBody::Values(Vec::new())
    }
}

/// A single `SELECT` scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    /// Projection items in order.
    pub projection: Vec<Projection>,
    /// `FROM` items with their joins.
    pub from: Vec<FromItem>,
    /// `WHERE` (and `PREWHERE`) predicate.
    pub selection: Vec<Expr>,
    /// `GROUP BY` clause.
    pub group_by: GroupBy,
    /// `HAVING` predicate.
    pub having: Option<Expr>,
    /// `QUALIFY` predicate.
    pub qualify: Option<Expr>,
    /// Named `WINDOW` definitions.
    pub windows: Vec<WindowSpec>,
    /// `DISTINCT ON (...)` expressions.
    pub distinct_on: Vec<Expr>,
}

/// One projection item.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// An expression with an optional alias.
    Expr {
        /// Projected expression.
        expr: Expr,
        /// Output alias, if any.
        alias: Option<String>,
    },
    /// `*` or `t.*`, with any wildcard options.
    Wildcard {
        /// SQL text of the item.
        sql: String,
    },
}

/// `GROUP BY` clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GroupBy {
    /// No grouping.
    #[default]
    None,
    /// Explicit grouping keys.
    Keys(Vec<Expr>),
    /// `GROUP BY ALL`.
    All,
}

/// A `FROM` item and the relations joined to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FromItem {
    /// Leading relation.
    pub relation: TableReference,
    /// Joined relations in order.
    pub joins: Vec<JoinItem>,
}

/// One joined relation.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinItem {
    /// Joined relation.
    pub relation: TableReference,
    /// `ON` / `MATCH_CONDITION` predicates.
    pub conditions: Vec<Expr>,
}

/// A relation referenced from a `FROM` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum TableReference {
    /// A named table or view, optionally called with table-function arguments.
    Named {
        /// Table name.
        name: QualifiedName,
        /// Alias, if any.
        alias: Option<String>,
        /// Table-function arguments (`pragma_table_info('t')`).
        args: Vec<Expr>,
    },
    /// A derived table (subquery in `FROM`).
    Derived {
        /// The subquery.
        subquery: Box<Query>,
        /// Alias, if any.
        alias: Option<String>,
    },
    /// A table-valued function call.
    Function {
        /// Function name.
        name: QualifiedName,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `UNNEST(...)` of array expressions.
    Unnest {
        /// Unnested expressions.
        exprs: Vec<Expr>,
    },
}

/// A window specification (`OVER (...)` or `WINDOW w AS (...)`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    /// Referenced named window, if any.
    pub name: Option<String>,
    /// `PARTITION BY` expressions.
    pub partition_by: Vec<Expr>,
    /// `ORDER BY` expressions.
    pub order_by: Vec<Expr>,
}

/// A function call.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Function name.
    pub name: QualifiedName,
    /// Arguments (including parametric-aggregate parameters).
    pub args: Vec<Expr>,
    /// Whether the arguments are `DISTINCT`.
    pub distinct: bool,
    /// Attached window, if the call is a window function.
    pub window: Option<WindowSpec>,
    /// `FILTER (WHERE ...)` and `WITHIN GROUP (ORDER BY ...)` expressions.
    pub modifiers: Vec<Expr>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference.
    Column(QualifiedName),
    /// Literal value (or bound parameter), as written.
    Literal(String),
    /// `*` or `t.*` used as an expression or function argument.
    Wildcard,
    /// Function call.
    Function(Box<FunctionCall>),
    /// Scalar, `EXISTS` or `IN` subquery.
    Subquery(Box<Query>),
    /// `CAST(expr AS type)` and friends.
    Cast(Box<Expr>),
    /// Operator application (`a + b`, `NOT a`, `CASE`, `BETWEEN`, `IN (...)`, ...).
    Composite(Vec<Expr>),
    /// Expression kind the adapter does not model, with the subqueries it contains.
    Opaque {
        /// SQL text of the expression.
        sql: String,
        /// Outermost subqueries found inside the expression.
        subqueries: Vec<Query>,
        /// Whether a window function call appears outside those subqueries.
        has_window: bool,
    },
}

impl Expr {
    /// Strip transparent wrappers (casts).
    pub fn unwrap_casts(&self) -> &Expr {
        let mut current = self;
        while let Expr::Cast(inner) = current {
            current = inner;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_keys_follow_the_case_rule() {
        let name = QualifiedName::from_identifiers([
            Identifier::new("Information_Schema"),
            Identifier::quoted("TABLES"),
        ]);
        assert_eq!(
            name.keys(IdentifierCase::FoldUnquoted),
            vec!["information_schema", "TABLES"]
        );
        assert_eq!(
            name.keys(IdentifierCase::Insensitive),
            vec!["information_schema", "tables"]
        );
        assert_eq!(name.to_string(), "Information_Schema.\"TABLES\"");
    }

    #[test]
    fn unwrap_casts_strips_nested_casts() {
        let inner = Expr::Column(QualifiedName::new(["salary"]));
        let wrapped = Expr::Cast(Box::new(Expr::Cast(Box::new(inner.clone()))));
        assert_eq!(wrapped.unwrap_casts(), &inner);
    }
}
