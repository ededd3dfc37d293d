//! Lowering from the `sqlparser` AST to the statement tree.
//!
//! Every query the lowering pass produces is counted and compared with the
//! number of queries a `sqlparser` visitor finds in the same statement. A
//! mismatch means some construct carried a nested query the pass did not
//! reach, and the statement is rejected instead of being half-checked.

use std::ops::ControlFlow;

use sqlparser::ast::{self as sp, Visit, Visitor};

use crate::parser::error::{ParseError, ParseResult};
use crate::parser::expr::{
    function_arg_payload, join_predicates, object_name_parts, statement_kind,
};
use crate::parser::names::Identifier;
use crate::parser::tree::{
    CteBinding, Expr, FromItem, FunctionCall, GroupBy, JoinItem, ParsedStatement, Projection,
    QualifiedName, Query, QueryBody, Select, SetOperator, TableReference, WindowSpec,
};

/// Maximum nesting depth of queries and expressions accepted by the lowering pass.
pub const MAX_EXPR_DEPTH: usize = 256;

/// Lower one `sqlparser` statement.
pub fn lower_statement(statement: &sp::Statement) -> ParseResult<ParsedStatement> {
    let sp::Statement::Query(query) = statement else {
        return Ok(ParsedStatement::Other {
            kind: statement_kind(statement),
        });
    };

    let mut lowerer = Lowerer::default();
    let lowered = lowerer.query(query, 0)?;

    let expected = count_queries(statement);
    if lowerer.queries != expected {
        return Err(ParseError::Unsupported(format!(
            "statement contains {expected} queries but only {} could be analyzed",
            lowerer.queries
        )));
    }
    Ok(ParsedStatement::Query(lowered))
}

#[derive(Default)]
struct Lowerer {
    queries: usize,
}

impl Lowerer {
    fn query(&mut self, query: &sp::Query, depth: usize) -> ParseResult<Query> {
        check_depth(depth)?;
        self.queries += 1;
        let next = depth + 1;

        let mut ctes = Vec::new();
        let mut recursive = false;
        if let Some(with) = &query.with {
            recursive = with.recursive;
            for cte in &with.cte_tables {
                ctes.push(CteBinding {
                    name: Identifier::from(&cte.alias.name),
                    body: self.query(&cte.query, next)?,
                });
            }
        }

        let body = self.set_expr(&query.body, next)?;

        let mut order_by = Vec::new();
        if let Some(order) = &query.order_by {
            if let sp::OrderByKind::Expressions(items) = &order.kind {
                for item in items {
                    order_by.push(self.expr(&item.expr, next)?);
                }
            }
        }

        let mut limit = Vec::new();
        match &query.limit_clause {
            Some(sp::LimitClause::LimitOffset {
                limit: count,
                offset,
                limit_by,
            }) => {
                if let Some(count) = count {
                    limit.push(self.expr(count, next)?);
                }
                if let Some(offset) = offset {
                    limit.push(self.expr(&offset.value, next)?);
                }
                for expr in limit_by {
                    limit.push(self.expr(expr, next)?);
                }
            }
            Some(sp::LimitClause::OffsetCommaLimit {
                offset,
                limit: count,
            }) => {
                limit.push(self.expr(offset, next)?);
                limit.push(self.expr(count, next)?);
            }
            None => {}
        }

        Ok(Query {
            ctes,
            recursive,
            body,
            order_by,
            limit,
            locking: !query.locks.is_empty(),
        })
    }

    fn set_expr(&mut self, body: &sp::SetExpr, depth: usize) -> ParseResult<QueryBody> {
        check_depth(depth)?;
        let next = depth + 1;
        match body {
            sp::SetExpr::Select(select) => self.select(select, next),
            sp::SetExpr::Query(query) => Ok(QueryBody::Nested(Box::new(self.query(query, next)?))),
            sp::SetExpr::SetOperation {
                op, left, right, ..
            } => {
                // Left-deep chains of the same operator become one flat branch list.
                let op = set_operator(op);
                let mut rights = vec![right.as_ref()];
                let mut leftmost = left.as_ref();
                while let sp::SetExpr::SetOperation {
                    op: inner_op,
                    left,
                    right,
                    ..
                } = leftmost
                {
                    if set_operator(inner_op) != op {
                        break;
                    }
                    rights.push(right.as_ref());
                    leftmost = left.as_ref();
                }

                let mut branches = Vec::with_capacity(rights.len() + 1);
                branches.push(self.set_expr(leftmost, next)?);
                for branch in rights.into_iter().rev() {
                    branches.push(self.set_expr(branch, next)?);
                }
                Ok(QueryBody::SetOperation { op, branches })
            }
            sp::SetExpr::Values(values) => {
                let mut rows = Vec::with_capacity(values.rows.len());
                for row in &values.rows {
                    let mut lowered = Vec::with_capacity(row.len());
                    for expr in row {
                        lowered.push(self.expr(expr, next)?);
                    }
                    rows.push(lowered);
                }
                Ok(QueryBody::Values(rows))
            }
            sp::SetExpr::Table(table) => {
                // `TABLE` keeps no quoting information; compare its parts exactly.
                let parts: Vec<Identifier> = table
                    .schema_name
                    .iter()
                    .chain(table.table_name.iter())
                    .map(|part| Identifier::quoted(part.as_str()))
                    .collect();
                if parts.is_empty() {
                    return Err(ParseError::Unsupported(format!("`{body}`")));
                }
                Ok(QueryBody::Select(Box::new(Select {
                    projection: vec![Projection::Wildcard {
                        sql: "*".to_string(),
                    }],
                    from: vec![FromItem {
                        relation: TableReference::Named {
                            name: QualifiedName::from_identifiers(parts),
                            alias: None,
                            args: Vec::new(),
                        },
                        joins: Vec::new(),
                    }],
                    ..Select::default()
                })))
            }
            sp::SetExpr::Insert(statement) => Ok(self.write_body("INSERT", statement)),
            sp::SetExpr::Update(statement) => Ok(self.write_body("UPDATE", statement)),
            sp::SetExpr::Delete(statement) => Ok(self.write_body("DELETE", statement)),
            other => Err(ParseError::Unsupported(format!("query body `{other}`"))),
        }
    }

    fn select(&mut self, select: &sp::Select, depth: usize) -> ParseResult<QueryBody> {
        check_depth(depth)?;
        let next = depth + 1;

        let mut projection = Vec::with_capacity(select.projection.len());
        for item in &select.projection {
            projection.push(match item {
                sp::SelectItem::UnnamedExpr(expr) => Projection::Expr {
                    expr: self.expr(expr, next)?,
                    alias: None,
                },
                sp::SelectItem::ExprWithAlias { expr, alias } => Projection::Expr {
                    expr: self.expr(expr, next)?,
                    alias: Some(alias.value.clone()),
                },
                other => Projection::Wildcard {
                    sql: other.to_string(),
                },
            });
        }

        let mut from = Vec::with_capacity(select.from.len());
        for table in &select.from {
            from.push(self.table_with_joins(table, next)?);
        }

        let mut selection = Vec::new();
        for predicate in [&select.prewhere, &select.selection].into_iter().flatten() {
            selection.push(self.expr(predicate, next)?);
        }

        let group_by = match &select.group_by {
            sp::GroupByExpr::All(_) => GroupBy::All,
            sp::GroupByExpr::Expressions(exprs, _) if exprs.is_empty() => GroupBy::None,
            sp::GroupByExpr::Expressions(exprs, _) => {
                let mut keys = Vec::with_capacity(exprs.len());
                for expr in exprs {
                    keys.push(self.expr(expr, next)?);
                }
                GroupBy::Keys(keys)
            }
        };

        let having = self.optional_expr(select.having.as_ref(), next)?;
        let qualify = self.optional_expr(select.qualify.as_ref(), next)?;

        let mut windows = Vec::new();
        for sp::NamedWindowDefinition(name, window) in &select.named_window {
            if let sp::NamedWindowExpr::WindowSpec(spec) = window {
                let mut lowered = self.window_spec(spec, next)?;
                lowered.name = Some(name.value.clone());
                windows.push(lowered);
            }
        }

        let mut distinct_on = Vec::new();
        if let Some(sp::Distinct::On(exprs)) = &select.distinct {
            for expr in exprs {
                distinct_on.push(self.expr(expr, next)?);
            }
        }

        // `SELECT ... INTO` creates a table; everything above was still lowered
        // so nested queries stay accounted for.
        if select.into.is_some() {
            return Ok(QueryBody::Write {
                kind: "SELECT INTO".to_string(),
            });
        }

        Ok(QueryBody::Select(Box::new(Select {
            projection,
            from,
            selection,
            group_by,
            having,
            qualify,
            windows,
            distinct_on,
        })))
    }

    fn table_with_joins(&mut self, table: &sp::TableWithJoins, depth: usize) -> ParseResult<FromItem> {
        check_depth(depth)?;
        let next = depth + 1;

        let mut items = self.table_factor(&table.relation, next)?;
        for join in &table.joins {
            let mut joined = self.table_factor(&join.relation, next)?;
            if let Some(first) = joined.first_mut() {
                for predicate in join_predicates(&join.join_operator) {
                    first.conditions.push(self.expr(predicate, next)?);
                }
            }
            items.extend(joined);
        }

        // The leading relation never carries predicates; they live on joined items.
        let mut items = items.into_iter();
        let Some(first) = items.next() else {
            return Err(ParseError::Unsupported(format!("empty relation in `{table}`")));
        };
        Ok(FromItem {
            relation: first.relation,
            joins: items.collect(),
        })
    }

    /// Flat list of the relations a table factor contributes.
    fn table_factor(&mut self, factor: &sp::TableFactor, depth: usize) -> ParseResult<Vec<JoinItem>> {
        check_depth(depth)?;
        let next = depth + 1;

        let relation = match factor {
            sp::TableFactor::Table {
                name, alias, args, ..
            } => {
                let mut lowered_args = Vec::new();
                if let Some(args) = args {
                    for arg in &args.args {
                        lowered_args.push(self.function_arg(arg, next)?);
                    }
                }
                TableReference::Named {
                    name: QualifiedName::from_identifiers(object_name_parts(name)),
                    alias: alias.as_ref().map(|alias| alias.name.value.clone()),
                    args: lowered_args,
                }
            }
            sp::TableFactor::Derived {
                subquery, alias, ..
            } => TableReference::Derived {
                subquery: Box::new(self.query(subquery, next)?),
                alias: alias.as_ref().map(|alias| alias.name.value.clone()),
            },
            sp::TableFactor::Function { name, args, .. } => {
                let mut lowered_args = Vec::with_capacity(args.len());
                for arg in args {
                    lowered_args.push(self.function_arg(arg, next)?);
                }
                TableReference::Function {
                    name: QualifiedName::from_identifiers(object_name_parts(name)),
                    args: lowered_args,
                }
            }
            sp::TableFactor::TableFunction { expr, .. } => TableReference::Function {
                name: QualifiedName::new(["TABLE"]),
                args: vec![self.expr(expr, next)?],
            },
            sp::TableFactor::UNNEST { array_exprs, .. } => {
                let mut exprs = Vec::with_capacity(array_exprs.len());
                for expr in array_exprs {
                    exprs.push(self.expr(expr, next)?);
                }
                TableReference::Unnest { exprs }
            }
            sp::TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                let nested = self.table_with_joins(table_with_joins, next)?;
                let mut items = vec![JoinItem {
                    relation: nested.relation,
                    conditions: Vec::new(),
                }];
                items.extend(nested.joins);
                return Ok(items);
            }
            sp::TableFactor::Pivot { table, .. } | sp::TableFactor::Unpivot { table, .. } => {
                return self.table_factor(table, next);
            }
            other => {
                return Err(ParseError::Unsupported(format!("table factor `{other}`")));
            }
        };

        Ok(vec![JoinItem {
            relation,
            conditions: Vec::new(),
        }])
    }

    fn optional_expr(&mut self, expr: Option<&sp::Expr>, depth: usize) -> ParseResult<Option<Expr>> {
        expr.map(|expr| self.expr(expr, depth)).transpose()
    }

    fn expr(&mut self, expr: &sp::Expr, depth: usize) -> ParseResult<Expr> {
        check_depth(depth)?;
        let next = depth + 1;

        Ok(match expr {
            sp::Expr::Identifier(ident) => {
                Expr::Column(QualifiedName::from_identifiers([Identifier::from(ident)]))
            }
            sp::Expr::CompoundIdentifier(parts) => {
                Expr::Column(QualifiedName::from_identifiers(parts.iter().map(Identifier::from)))
            }
            sp::Expr::Value(value) => Expr::Literal(value.to_string()),
            sp::Expr::TypedString { .. } => Expr::Literal(expr.to_string()),
            sp::Expr::Nested(inner) => self.expr(inner, next)?,
            sp::Expr::Cast { expr: inner, .. } => Expr::Cast(Box::new(self.expr(inner, next)?)),
            sp::Expr::UnaryOp { expr: inner, .. }
            | sp::Expr::IsNull(inner)
            | sp::Expr::IsNotNull(inner)
            | sp::Expr::IsTrue(inner)
            | sp::Expr::IsNotTrue(inner)
            | sp::Expr::IsFalse(inner)
            | sp::Expr::IsNotFalse(inner)
            | sp::Expr::IsUnknown(inner)
            | sp::Expr::IsNotUnknown(inner) => Expr::Composite(vec![self.expr(inner, next)?]),
            sp::Expr::BinaryOp { left, right, .. }
            | sp::Expr::AnyOp { left, right, .. }
            | sp::Expr::AllOp { left, right, .. }
            | sp::Expr::IsDistinctFrom(left, right)
            | sp::Expr::IsNotDistinctFrom(left, right)
            | sp::Expr::Like {
                expr: left,
                pattern: right,
                ..
            }
            | sp::Expr::ILike {
                expr: left,
                pattern: right,
                ..
            }
            | sp::Expr::SimilarTo {
                expr: left,
                pattern: right,
                ..
            } => Expr::Composite(vec![self.expr(left, next)?, self.expr(right, next)?]),
            sp::Expr::Between {
                expr: inner,
                low,
                high,
                ..
            } => Expr::Composite(vec![
                self.expr(inner, next)?,
                self.expr(low, next)?,
                self.expr(high, next)?,
            ]),
            sp::Expr::InList {
                expr: inner, list, ..
            } => {
                let mut operands = Vec::with_capacity(list.len() + 1);
                operands.push(self.expr(inner, next)?);
                for item in list {
                    operands.push(self.expr(item, next)?);
                }
                Expr::Composite(operands)
            }
            sp::Expr::Tuple(items) => {
                let mut operands = Vec::with_capacity(items.len());
                for item in items {
                    operands.push(self.expr(item, next)?);
                }
                Expr::Composite(operands)
            }
            sp::Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                let mut operands = Vec::with_capacity(conditions.len() * 2 + 2);
                if let Some(operand) = operand {
                    operands.push(self.expr(operand, next)?);
                }
                for when in conditions {
                    operands.push(self.expr(&when.condition, next)?);
                    operands.push(self.expr(&when.result, next)?);
                }
                if let Some(else_result) = else_result {
                    operands.push(self.expr(else_result, next)?);
                }
                Expr::Composite(operands)
            }
            sp::Expr::Exists { subquery, .. } | sp::Expr::Subquery(subquery) => {
                Expr::Subquery(Box::new(self.query(subquery, next)?))
            }
            sp::Expr::Function(function) => Expr::Function(Box::new(self.function(function, next)?)),
            sp::Expr::Wildcard(_) | sp::Expr::QualifiedWildcard(..) => Expr::Wildcard,
            other => self.opaque(other, next)?,
        })
    }

    fn function(&mut self, function: &sp::Function, depth: usize) -> ParseResult<FunctionCall> {
        check_depth(depth)?;
        let next = depth + 1;

        let mut args = Vec::new();
        self.function_arguments(&function.parameters, &mut args, next)?;
        let distinct = self.function_arguments(&function.args, &mut args, next)?;

        let window = match &function.over {
            None => None,
            Some(sp::WindowType::WindowSpec(spec)) => Some(self.window_spec(spec, next)?),
            Some(sp::WindowType::NamedWindow(name)) => Some(WindowSpec {
                name: Some(name.value.clone()),
                ..WindowSpec::default()
            }),
        };

        let mut modifiers = Vec::new();
        if let Some(filter) = &function.filter {
            modifiers.push(self.expr(filter, next)?);
        }
        for order in &function.within_group {
            modifiers.push(self.expr(&order.expr, next)?);
        }

        Ok(FunctionCall {
            name: QualifiedName::from_identifiers(object_name_parts(&function.name)),
            args,
            distinct,
            window,
            modifiers,
        })
    }

    /// Lower an argument list into `out`; returns whether it was `DISTINCT`.
    fn function_arguments(
        &mut self,
        arguments: &sp::FunctionArguments,
        out: &mut Vec<Expr>,
        depth: usize,
    ) -> ParseResult<bool> {
        match arguments {
            sp::FunctionArguments::None => Ok(false),
            sp::FunctionArguments::Subquery(query) => {
                out.push(Expr::Subquery(Box::new(self.query(query, depth)?)));
                Ok(false)
            }
            sp::FunctionArguments::List(list) => {
                for arg in &list.args {
                    out.push(self.function_arg(arg, depth)?);
                }
                Ok(matches!(
                    list.duplicate_treatment,
                    Some(sp::DuplicateTreatment::Distinct)
                ))
            }
        }
    }

    fn function_arg(&mut self, arg: &sp::FunctionArg, depth: usize) -> ParseResult<Expr> {
        match function_arg_payload(arg) {
            sp::FunctionArgExpr::Expr(expr) => self.expr(expr, depth),
            sp::FunctionArgExpr::QualifiedWildcard(_) | sp::FunctionArgExpr::Wildcard => {
                Ok(Expr::Wildcard)
            }
        }
    }

    fn window_spec(&mut self, spec: &sp::WindowSpec, depth: usize) -> ParseResult<WindowSpec> {
        check_depth(depth)?;
        let next = depth + 1;

        let mut partition_by = Vec::with_capacity(spec.partition_by.len());
        for expr in &spec.partition_by {
            partition_by.push(self.expr(expr, next)?);
        }
        let mut order_by = Vec::with_capacity(spec.order_by.len());
        for item in &spec.order_by {
            order_by.push(self.expr(&item.expr, next)?);
        }
        Ok(WindowSpec {
            name: spec.window_name.as_ref().map(|name| name.value.clone()),
            partition_by,
            order_by,
        })
    }

    /// A write body is never analyzed, but the queries inside it still count.
    fn write_body(&mut self, kind: &str, statement: &sp::Statement) -> QueryBody {
        self.queries += count_queries(statement);
        QueryBody::Write {
            kind: kind.to_string(),
        }
    }

    /// Keep an unmodeled expression as text plus its outermost subqueries.
    fn opaque(&mut self, expr: &sp::Expr, depth: usize) -> ParseResult<Expr> {
        let mut collector = OutermostQueries::default();
        let _ = expr.visit(&mut collector);

        let mut subqueries = Vec::with_capacity(collector.found.len());
        for query in &collector.found {
            subqueries.push(self.query(query, depth)?);
        }
        Ok(Expr::Opaque {
            sql: expr.to_string(),
            subqueries,
            has_window: collector.windowed,
        })
    }
}

// ---- Helper functions ----

fn check_depth(depth: usize) -> ParseResult<()> {
    if depth > MAX_EXPR_DEPTH {
        return Err(ParseError::NestingTooDeep {
            limit: MAX_EXPR_DEPTH,
        });
    }
    Ok(())
}

fn set_operator(op: &sp::SetOperator) -> SetOperator {
    match op {
        sp::SetOperator::Union => SetOperator::Union,
        sp::SetOperator::Intersect => SetOperator::Intersect,
        _ => SetOperator::Except,
    }
}

/// Number of queries anywhere inside `node`, as seen by `sqlparser`.
fn count_queries<V: Visit>(node: &V) -> usize {
    #[derive(Default)]
    struct QueryCounter {
        count: usize,
    }

    impl Visitor for QueryCounter {
        type Break = ();

        fn pre_visit_query(&mut self, _query: &sp::Query) -> ControlFlow<Self::Break> {
            self.count += 1;
            ControlFlow::Continue(())
        }
    }

    let mut counter = QueryCounter::default();
    let _ = node.visit(&mut counter);
    counter.count
}

/// Collects the queries not nested inside another query, and notes window
/// calls outside them.
#[derive(Default)]
struct OutermostQueries {
    depth: usize,
    found: Vec<sp::Query>,
    windowed: bool,
}

impl Visitor for OutermostQueries {
    type Break = ();

    fn pre_visit_expr(&mut self, expr: &sp::Expr) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            if let sp::Expr::Function(function) = expr {
                self.windowed |= function.over.is_some();
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &sp::Query) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            self.found.push(query.clone());
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &sp::Query) -> ControlFlow<Self::Break> {
        self.depth = self.depth.saturating_sub(1);
        ControlFlow::Continue(())
    }
}
