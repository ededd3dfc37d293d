//! Per-scope access rules.
//!
//! Each check looks at one `SELECT` scope only. Nested queries are never
//! inspected here; the policy engine visits them as scopes of their own.

use crate::catalog::dialect::Dialect;
use crate::catalog::schema_catalog::parts_are_schema_only;
use crate::classifier::function_registry::FunctionRegistry;
use crate::output::reason::BlockReason;
use crate::parser::names::IdentifierCase;
use crate::parser::tree::{
    Expr, GroupBy, Projection, QualifiedName, Query, Select, TableReference,
};

/// A rule violation: the reason code plus a short description of the culprit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Reason code reported to the caller.
    pub reason: BlockReason,
    /// Diagnostic text naming the offending construct.
    pub detail: String,
}

impl Violation {
    /// Build a violation.
    pub fn new(reason: BlockReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Schema-only rule: every named relation must be a catalog object or a visible CTE.
///
/// `visible_ctes` holds CTE name keys under the dialect's identifier case.
pub fn check_schema_only(
    select: &Select,
    dialect: Dialect,
    visible_ctes: &[String],
) -> Result<(), Violation> {
    for relation in relations(select) {
        let name = match relation {
            TableReference::Named { name, .. } | TableReference::Function { name, .. } => name,
            TableReference::Derived { .. } | TableReference::Unnest { .. } => continue,
        };
        if is_visible_cte(name, visible_ctes, dialect.identifier_case())
            || parts_are_schema_only(dialect, &name.parts)
        {
            continue;
        }
        return Err(Violation::new(
            BlockReason::TableNotInSchemaAllowlist,
            format!("table `{name}` is not a {dialect} catalog object"),
        ));
    }
    Ok(())
}

/// Aggregates rule for one `SELECT`: projection shape, then window use in
/// `HAVING` and `QUALIFY`.
pub fn check_aggregates(
    select: &Select,
    dialect: Dialect,
    registry: &FunctionRegistry,
) -> Result<(), Violation> {
    let case = dialect.identifier_case();
    let group_keys = group_key_columns(select, case);

    for item in &select.projection {
        let expr = match item {
            Projection::Wildcard { sql } => {
                return Err(Violation::new(
                    BlockReason::WildcardSelectBlocked,
                    format!("wildcard projection `{sql}`"),
                ));
            }
            Projection::Expr { expr, .. } => expr,
        };

        if contains_window(expr) {
            return Err(window_violation("projection"));
        }

        if let Some(raw) = first_raw_value(expr, &group_keys, case, registry) {
            return Err(Violation::new(
                BlockReason::RawColumnNotAllowed,
                format!("projection `{}` is not aggregated or grouped", describe(raw)),
            ));
        }
    }

    for (clause, expr) in [("HAVING", &select.having), ("QUALIFY", &select.qualify)] {
        if expr.as_ref().is_some_and(contains_window) {
            return Err(window_violation(clause));
        }
    }
    Ok(())
}

/// Aggregates rule for query-level `ORDER BY`.
pub fn check_aggregates_ordering(query: &Query) -> Result<(), Violation> {
    if query.order_by.iter().any(contains_window) {
        return Err(window_violation("ORDER BY"));
    }
    Ok(())
}

/// All relations referenced by a `SELECT`, in textual order.
pub fn relations(select: &Select) -> impl Iterator<Item = &TableReference> {
    select.from.iter().flat_map(|item| {
        std::iter::once(&item.relation).chain(item.joins.iter().map(|join| &join.relation))
    })
}

/// Append the queries directly nested in `select` to `out`, in textual order.
pub fn select_subqueries<'a>(select: &'a Select, out: &mut Vec<&'a Query>) {
    for expr in &select.distinct_on {
        expr_subqueries(expr, out);
    }
    for item in &select.projection {
        if let Projection::Expr { expr, .. } = item {
            expr_subqueries(expr, out);
        }
    }
    for item in &select.from {
        relation_subqueries(&item.relation, out);
        for join in &item.joins {
            relation_subqueries(&join.relation, out);
            for condition in &join.conditions {
                expr_subqueries(condition, out);
            }
        }
    }
    for expr in &select.selection {
        expr_subqueries(expr, out);
    }
    if let GroupBy::Keys(keys) = &select.group_by {
        for key in keys {
            expr_subqueries(key, out);
        }
    }
    for expr in select.having.iter().chain(select.qualify.iter()) {
        expr_subqueries(expr, out);
    }
    for window in &select.windows {
        for expr in window.partition_by.iter().chain(window.order_by.iter()) {
            expr_subqueries(expr, out);
        }
    }
}

/// Append the outermost queries nested in `expr` to `out`.
pub fn expr_subqueries<'a>(expr: &'a Expr, out: &mut Vec<&'a Query>) {
    match expr {
        Expr::Subquery(query) => out.push(query),
        Expr::Opaque { subqueries, .. } => out.extend(subqueries.iter()),
        Expr::Cast(inner) => expr_subqueries(inner, out),
        Expr::Composite(operands) => {
            for operand in operands {
                expr_subqueries(operand, out);
            }
        }
        Expr::Function(call) => {
            for arg in call.args.iter().chain(call.modifiers.iter()) {
                expr_subqueries(arg, out);
            }
            if let Some(window) = &call.window {
                for expr in window.partition_by.iter().chain(window.order_by.iter()) {
                    expr_subqueries(expr, out);
                }
            }
        }
        Expr::Column(_) | Expr::Literal(_) | Expr::Wildcard => {}
    }
}

/// True when `expr` calls a window function outside any nested query.
pub fn contains_window(expr: &Expr) -> bool {
    match expr {
        Expr::Function(call) => {
            call.window.is_some()
                || call
                    .args
                    .iter()
                    .chain(call.modifiers.iter())
                    .any(contains_window)
        }
        Expr::Cast(inner) => contains_window(inner),
        Expr::Composite(operands) => operands.iter().any(contains_window),
        Expr::Opaque { has_window, .. } => *has_window,
        Expr::Column(_) | Expr::Literal(_) | Expr::Wildcard | Expr::Subquery(_) => false,
    }
}

// ---- Helper functions ----

fn relation_subqueries<'a>(relation: &'a TableReference, out: &mut Vec<&'a Query>) {
    match relation {
        TableReference::Derived { subquery, .. } => out.push(subquery),
        TableReference::Named { args, .. } | TableReference::Function { args, .. } => {
            for arg in args {
                expr_subqueries(arg, out);
            }
        }
        TableReference::Unnest { exprs } => {
            for expr in exprs {
                expr_subqueries(expr, out);
            }
        }
    }
}

/// `visible_ctes` holds comparison keys under `case`.
fn is_visible_cte(name: &QualifiedName, visible_ctes: &[String], case: IdentifierCase) -> bool {
    match name.parts.as_slice() {
        [part] => visible_ctes.contains(&case.key(part)),
        _ => false,
    }
}

/// Column keys of the `GROUP BY` clause under `case`.
///
/// Positional keys (`GROUP BY 2`) resolve to the projection item they name.
/// Output aliases do not: engines disagree on whether a name means the alias
/// or the input column. `GROUP BY ALL` grants nothing.
fn group_key_columns(select: &Select, case: IdentifierCase) -> Vec<Vec<String>> {
    let GroupBy::Keys(keys) = &select.group_by else {
        return Vec::new();
    };
    keys.iter()
        .filter_map(|key| match resolve_group_key(key, &select.projection).unwrap_casts() {
            Expr::Column(name) => Some(name.keys(case)),
            _ => None,
        })
        .collect()
}

fn resolve_group_key<'a>(key: &'a Expr, projection: &'a [Projection]) -> &'a Expr {
    let Expr::Literal(text) = key.unwrap_casts() else {
        return key;
    };
    let Ok(position) = text.parse::<usize>() else {
        return key;
    };
    match position.checked_sub(1).and_then(|index| projection.get(index)) {
        Some(Projection::Expr { expr, .. }) => expr,
        _ => key,
    }
}

/// First sub-expression that can carry a per-row value.
///
/// Aggregate calls, literals, grouped columns and scalar subqueries (checked
/// as their own scopes) are safe; operators and casts are safe when all of
/// their operands are.
fn first_raw_value<'a>(
    expr: &'a Expr,
    group_keys: &[Vec<String>],
    case: IdentifierCase,
    registry: &FunctionRegistry,
) -> Option<&'a Expr> {
    match expr {
        Expr::Function(call) if registry.is_aggregate(&call.name) => None,
        Expr::Literal(_) | Expr::Subquery(_) => None,
        Expr::Column(name) if group_keys.contains(&name.keys(case)) => None,
        Expr::Cast(inner) => first_raw_value(inner, group_keys, case, registry),
        Expr::Composite(operands) => operands
            .iter()
            .find_map(|operand| first_raw_value(operand, group_keys, case, registry)),
        Expr::Function(_) | Expr::Column(_) | Expr::Wildcard | Expr::Opaque { .. } => Some(expr),
    }
}

fn window_violation(clause: &str) -> Violation {
    Violation::new(
        BlockReason::WindowFunctionBlocked,
        format!("window function in {clause}"),
    )
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Column(name) => name.to_string(),
        Expr::Function(call) => format!("{}(...)", call.name),
        Expr::Opaque { sql, .. } => sql.clone(),
        Expr::Literal(text) => text.clone(),
        Expr::Composite(_) => "expression".to_string(),
        Expr::Cast(_) => "cast".to_string(),
        Expr::Wildcard => "*".to_string(),
        Expr::Subquery(_) => "subquery".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sql_parser::parse;
    use crate::parser::tree::{ParsedStatement, QueryBody};

    fn select(sql: &str, dialect: Dialect) -> Select {
        let ParsedStatement::Query(query) = parse(sql, dialect).expect("query should parse") else {
            panic!("expected a query");
        };
        match query.body {
            QueryBody::Select(select) => *select,
            other => panic!("expected select body, got {other:?}"),
        }
    }

    fn aggregates(sql: &str) -> Result<(), Violation> {
        check_aggregates(
            &select(sql, Dialect::PostgreSql),
            Dialect::PostgreSql,
            &FunctionRegistry::default(),
        )
    }

    fn reason(result: Result<(), Violation>) -> Option<BlockReason> {
        result.err().map(|violation| violation.reason)
    }

    #[test]
    fn schema_only_accepts_catalog_and_cte_names() {
        let catalog = select(
            "SELECT * FROM information_schema.tables t JOIN pg_catalog.pg_class c ON true",
            Dialect::PostgreSql,
        );
        assert!(check_schema_only(&catalog, Dialect::PostgreSql, &[]).is_ok());

        let cte = select("SELECT * FROM cols", Dialect::PostgreSql);
        assert!(check_schema_only(&cte, Dialect::PostgreSql, &["cols".to_string()]).is_ok());
        let err = check_schema_only(&cte, Dialect::PostgreSql, &[]).expect_err("not a CTE here");
        assert_eq!(err.reason, BlockReason::TableNotInSchemaAllowlist);
        assert!(err.detail.contains("cols"), "detail was {}", err.detail);
    }

    #[test]
    fn schema_only_rejects_qualified_name_matching_a_cte() {
        let qualified = select("SELECT * FROM public.cols", Dialect::PostgreSql);
        assert!(check_schema_only(&qualified, Dialect::PostgreSql, &["cols".to_string()]).is_err());
    }

    #[test]
    fn schema_only_cte_match_respects_quoting() {
        let bare = select("SELECT * FROM users", Dialect::PostgreSql);
        assert!(check_schema_only(&bare, Dialect::PostgreSql, &["Users".to_string()]).is_err());
        assert!(check_schema_only(&bare, Dialect::PostgreSql, &["users".to_string()]).is_ok());

        let quoted = select(r#"SELECT * FROM "Users""#, Dialect::PostgreSql);
        assert!(check_schema_only(&quoted, Dialect::PostgreSql, &["users".to_string()]).is_err());
        assert!(check_schema_only(&quoted, Dialect::PostgreSql, &["Users".to_string()]).is_ok());
    }

    #[test]
    fn schema_only_rejects_quoted_lookalike_namespace() {
        let lookalike = select(r#"SELECT * FROM "PG_CATALOG".pg_class"#, Dialect::PostgreSql);
        let err = check_schema_only(&lookalike, Dialect::PostgreSql, &[])
            .expect_err("quoted uppercase schema is a user schema");
        assert_eq!(err.reason, BlockReason::TableNotInSchemaAllowlist);
    }

    #[test]
    fn schema_only_checks_sqlite_table_valued_pragmas() {
        let pragma = select("SELECT name FROM pragma_table_info('users')", Dialect::Sqlite);
        assert!(check_schema_only(&pragma, Dialect::Sqlite, &[]).is_ok());
    }

    #[test]
    fn aggregates_accepts_aggregates_constants_and_grouped_columns() {
        assert!(aggregates("SELECT count(*), 1, 'x', -2 FROM users").is_ok());
        assert!(aggregates("SELECT CAST(avg(salary) AS int) FROM employees").is_ok());
        assert!(aggregates("SELECT dept, count(*) FROM employees GROUP BY dept").is_ok());
        assert!(aggregates("SELECT dept, count(*) FROM employees GROUP BY 1").is_ok());
        assert!(aggregates("SELECT sum(a) / count(*) * 100 FROM t").is_ok());
        assert!(aggregates(
            "SELECT dept, CASE WHEN count(*) > 10 THEN 'big' ELSE 'small' END FROM e GROUP BY dept"
        )
        .is_ok());
    }

    #[test]
    fn aggregates_rejects_raw_and_ungrouped_columns() {
        assert_eq!(
            reason(aggregates("SELECT email FROM users")),
            Some(BlockReason::RawColumnNotAllowed)
        );
        assert_eq!(
            reason(aggregates("SELECT email, count(*) FROM users GROUP BY dept")),
            Some(BlockReason::RawColumnNotAllowed)
        );
        assert_eq!(
            reason(aggregates("SELECT lower(email) FROM users")),
            Some(BlockReason::RawColumnNotAllowed)
        );
        assert_eq!(
            reason(aggregates("SELECT count(*) + salary FROM employees")),
            Some(BlockReason::RawColumnNotAllowed)
        );
        assert_eq!(
            reason(aggregates("SELECT lower(dept) FROM employees GROUP BY dept")),
            Some(BlockReason::RawColumnNotAllowed)
        );
        assert_eq!(
            reason(aggregates("SELECT dept AS d, count(*) FROM employees GROUP BY d")),
            Some(BlockReason::RawColumnNotAllowed)
        );
        assert_eq!(
            reason(aggregates("SELECT dept FROM employees GROUP BY ALL")),
            Some(BlockReason::RawColumnNotAllowed)
        );
        assert_eq!(
            reason(aggregates("SELECT public.count(email) FROM users")),
            Some(BlockReason::RawColumnNotAllowed)
        );
    }

    #[test]
    fn group_keys_compare_quoted_columns_exactly() {
        assert!(aggregates(r#"SELECT Dept, count(*) FROM e GROUP BY dept"#).is_ok());
        assert!(aggregates(r#"SELECT "dept", count(*) FROM e GROUP BY dept"#).is_ok());
        assert_eq!(
            reason(aggregates(r#"SELECT "Dept", count(*) FROM e GROUP BY dept"#)),
            Some(BlockReason::RawColumnNotAllowed)
        );
    }

    #[test]
    fn aggregates_checks_wildcard_before_windows() {
        assert_eq!(
            reason(aggregates("SELECT *, rank() OVER () FROM users")),
            Some(BlockReason::WildcardSelectBlocked)
        );
        assert_eq!(
            reason(aggregates("SELECT u.* FROM users u")),
            Some(BlockReason::WildcardSelectBlocked)
        );
    }

    #[test]
    fn aggregates_rejects_windows_anywhere_in_the_scope() {
        assert_eq!(
            reason(aggregates("SELECT avg(salary) OVER (PARTITION BY dept) FROM employees")),
            Some(BlockReason::WindowFunctionBlocked)
        );
        assert_eq!(
            reason(aggregates("SELECT 1 + sum(x) OVER () FROM t")),
            Some(BlockReason::WindowFunctionBlocked)
        );
        assert_eq!(
            reason(aggregates(
                "SELECT count(*) FROM t GROUP BY g HAVING max(sum(x) OVER ()) > 1"
            )),
            Some(BlockReason::WindowFunctionBlocked)
        );
    }

    #[test]
    fn subqueries_are_collected_in_textual_order() {
        let scope = select(
            "SELECT (SELECT 1) FROM (SELECT 2) d JOIN t ON t.x IN (SELECT 3) \
             WHERE EXISTS (SELECT 4) GROUP BY (SELECT 5) HAVING (SELECT 6) > 0",
            Dialect::PostgreSql,
        );
        let mut found = Vec::new();
        select_subqueries(&scope, &mut found);
        let literals: Vec<String> = found
            .iter()
            .map(|query| match &query.body {
                QueryBody::Select(inner) => match &inner.projection[0] {
                    Projection::Expr { expr, .. } => describe(expr),
                    Projection::Wildcard { sql } => sql.clone(),
                },
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(literals, vec!["1", "2", "3", "4", "5", "6"]);
    }
}
