//! Recursive policy enforcement over a parsed statement.
//!
//! Scopes are visited pre-order, depth first, from an explicit work stack: a
//! scope's own rules run before any of its children, and children run in the
//! order they appear in the text. The first violation wins.

use std::rc::Rc;

use crate::catalog::dialect::Dialect;
use crate::classifier::access_level::AccessLevel;
use crate::classifier::function_registry::FunctionRegistry;
use crate::classifier::rules::{
    check_aggregates, check_aggregates_ordering, check_schema_only, expr_subqueries,
    select_subqueries, Violation,
};
use crate::output::reason::BlockReason;
use crate::output::validation_result::ValidationResult;
use crate::parser::tree::{ParsedStatement, Query, QueryBody};

/// Maximum scope nesting depth (subqueries, CTEs, set-operation branches).
pub const MAX_SCOPE_DEPTH: usize = 64;

/// CTE names visible from a scope, as comparison keys under the dialect's case rule.
type CteNames = Rc<Vec<String>>;

/// Pending unit of work on the traversal stack.
///
/// `top_level` is true only for the statement's own query and body, where a
/// bare `VALUES` list is a statement rather than a row source.
enum Work<'a> {
    Query {
        query: &'a Query,
        depth: usize,
        ctes: CteNames,
        top_level: bool,
    },
    Body {
        body: &'a QueryBody,
        depth: usize,
        ctes: CteNames,
        top_level: bool,
    },
}

/// Enforces one access level for one dialect.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    /// Level being enforced.
    pub access_level: AccessLevel,
    /// Dialect whose catalog applies.
    pub dialect: Dialect,
    /// Functions treated as aggregates.
    pub registry: FunctionRegistry,
}

impl PolicyEngine {
    /// Engine with the built-in aggregate registry.
    pub fn new(access_level: AccessLevel, dialect: Dialect) -> Self {
        Self::with_registry(access_level, dialect, FunctionRegistry::default())
    }

    /// Engine with a custom aggregate registry.
    pub fn with_registry(
        access_level: AccessLevel,
        dialect: Dialect,
        registry: FunctionRegistry,
    ) -> Self {
        Self {
            access_level,
            dialect,
            registry,
        }
    }

    /// Check `statement`; `Err` carries the first violation found.
    pub fn evaluate(&self, statement: &ParsedStatement) -> Result<(), Violation> {
        let query = match statement {
            ParsedStatement::Query(query) => query,
            ParsedStatement::Other { kind } => {
                return Err(Violation::new(
                    BlockReason::NonSelectStatement,
                    format!("{kind} statement is not a read query"),
                ));
            }
        };

        let mut stack = vec![Work::Query {
            query,
            depth: 0,
            ctes: Rc::new(Vec::new()),
            top_level: true,
        }];
        while let Some(work) = stack.pop() {
            match work {
                Work::Query {
                    query,
                    depth,
                    ctes,
                    top_level,
                } => self.visit_query(query, depth, ctes, top_level, &mut stack)?,
                Work::Body {
                    body,
                    depth,
                    ctes,
                    top_level,
                } => self.visit_body(body, depth, ctes, top_level, &mut stack)?,
            }
        }
        Ok(())
    }

    /// Check `statement` and package the verdict for `query`.
    pub fn validate(&self, statement: &ParsedStatement, query: &str) -> ValidationResult {
        match self.evaluate(statement) {
            Ok(()) => ValidationResult::allowed(query, self.access_level, self.dialect),
            Err(violation) => ValidationResult::blocked(
                query,
                self.access_level,
                self.dialect,
                violation.reason,
                violation.detail,
            ),
        }
    }

    /// Run a query's own rules and push its CTEs, body and trailing subqueries.
    fn visit_query<'a>(
        &self,
        query: &'a Query,
        depth: usize,
        outer: CteNames,
        top_level: bool,
        stack: &mut Vec<Work<'a>>,
    ) -> Result<(), Violation> {
        check_depth(depth)?;
        if query.locking {
            return Err(Violation::new(
                BlockReason::NonSelectStatement,
                "row-locking clause (FOR UPDATE / FOR SHARE)",
            ));
        }
        if self.access_level == AccessLevel::Aggregates {
            check_aggregates_ordering(query)?;
        }

        let case = self.dialect.identifier_case();
        let cte_names: Vec<String> = query.ctes.iter().map(|cte| case.key(&cte.name)).collect();
        let body_ctes = extend_names(&outer, &cte_names);

        let mut children = Vec::with_capacity(query.ctes.len() + 1);
        for (index, cte) in query.ctes.iter().enumerate() {
            // A recursive WITH sees all of its names; otherwise only earlier ones.
            let visible = if query.recursive {
                Rc::clone(&body_ctes)
            } else {
                extend_names(&outer, &cte_names[..index])
            };
            children.push(Work::Query {
                query: &cte.body,
                depth: depth + 1,
                ctes: visible,
                top_level: false,
            });
        }
        children.push(Work::Body {
            body: &query.body,
            depth,
            ctes: Rc::clone(&body_ctes),
            top_level,
        });

        let mut trailing = Vec::new();
        for expr in query.order_by.iter().chain(query.limit.iter()) {
            expr_subqueries(expr, &mut trailing);
        }
        children.extend(trailing.into_iter().map(|nested| Work::Query {
            query: nested,
            depth: depth + 1,
            ctes: Rc::clone(&body_ctes),
            top_level: false,
        }));

        push_in_order(stack, children);
        Ok(())
    }

    fn visit_body<'a>(
        &self,
        body: &'a QueryBody,
        depth: usize,
        ctes: CteNames,
        top_level: bool,
        stack: &mut Vec<Work<'a>>,
    ) -> Result<(), Violation> {
        check_depth(depth)?;
        match body {
            QueryBody::Select(select) => {
                match self.access_level {
                    AccessLevel::SchemaOnly => check_schema_only(select, self.dialect, &ctes)?,
                    AccessLevel::Aggregates => check_aggregates(select, self.dialect, &self.registry)?,
                    AccessLevel::Full => {}
                }
                let mut nested = Vec::new();
                select_subqueries(select, &mut nested);
                push_in_order(
                    stack,
                    nested.into_iter().map(|query| Work::Query {
                        query,
                        depth: depth + 1,
                        ctes: Rc::clone(&ctes),
                        top_level: false,
                    }),
                );
            }
            QueryBody::SetOperation { branches, .. } => {
                push_in_order(
                    stack,
                    branches.iter().map(|branch| Work::Body {
                        body: branch,
                        depth: depth + 1,
                        ctes: Rc::clone(&ctes),
                        top_level: false,
                    }),
                );
            }
            QueryBody::Nested(query) => stack.push(Work::Query {
                query: query.as_ref(),
                depth: depth + 1,
                ctes,
                top_level,
            }),
            QueryBody::Values(rows) => {
                if top_level {
                    return Err(Violation::new(
                        BlockReason::NonSelectStatement,
                        "VALUES statement is not a SELECT",
                    ));
                }
                let mut nested = Vec::new();
                for expr in rows.iter().flatten() {
                    expr_subqueries(expr, &mut nested);
                }
                push_in_order(
                    stack,
                    nested.into_iter().map(|query| Work::Query {
                        query,
                        depth: depth + 1,
                        ctes: Rc::clone(&ctes),
                        top_level: false,
                    }),
                );
            }
            QueryBody::Write { kind } => {
                return Err(Violation::new(
                    BlockReason::NonSelectStatement,
                    format!("{kind} inside a query is not a read"),
                ));
            }
        }
        Ok(())
    }
}

/// Check `statement` under `access_level` with the built-in aggregate registry.
pub fn evaluate(
    statement: &ParsedStatement,
    access_level: AccessLevel,
    dialect: Dialect,
) -> Result<(), Violation> {
    PolicyEngine::new(access_level, dialect).evaluate(statement)
}

/// Check `statement` and package the verdict for `query`.
pub fn validate(
    statement: &ParsedStatement,
    query: &str,
    access_level: AccessLevel,
    dialect: Dialect,
) -> ValidationResult {
    PolicyEngine::new(access_level, dialect).validate(statement, query)
}

// ---- Helper functions ----

fn check_depth(depth: usize) -> Result<(), Violation> {
    if depth > MAX_SCOPE_DEPTH {
        return Err(Violation::new(
            BlockReason::TooComplex,
            format!("query nesting exceeds {MAX_SCOPE_DEPTH} levels"),
        ));
    }
    Ok(())
}

fn extend_names(outer: &CteNames, names: &[String]) -> CteNames {
    if names.is_empty() {
        return Rc::clone(outer);
    }
    let mut visible = Vec::with_capacity(outer.len() + names.len());
    visible.extend(outer.iter().cloned());
    visible.extend(names.iter().cloned());
    Rc::new(visible)
}

/// Push `items` so they pop in their original order.
fn push_in_order<'a, I>(stack: &mut Vec<Work<'a>>, items: I)
where
    I: IntoIterator<Item = Work<'a>>,
{
    let mut items: Vec<Work<'a>> = items.into_iter().collect();
    items.reverse();
    stack.extend(items);
}
