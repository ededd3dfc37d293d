use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, JoinConstraint, JoinOperator, ObjectName, Statement,
};

use crate::parser::names::Identifier;

/// Extract the payload from a SQL function argument, ignoring its name.
pub fn function_arg_payload(arg: &FunctionArg) -> &FunctionArgExpr {
    match arg {
        FunctionArg::Unnamed(payload)
        | FunctionArg::Named { arg: payload, .. }
        | FunctionArg::ExprNamed { arg: payload, .. } => payload,
    }
}

/// Extract the `ON` predicate and, for `ASOF` joins, the match condition.
pub fn join_predicates(op: &JoinOperator) -> Vec<&Expr> {
    use sqlparser::ast::JoinOperator::{
        AsOf, FullOuter, Inner, Join, Left, LeftAnti, LeftOuter, LeftSemi, Right, RightAnti,
        RightOuter, RightSemi,
    };
    let (constraint, match_condition) = match op {
        Join(c) | Inner(c) | Left(c) | LeftOuter(c) | Right(c) | RightOuter(c) | FullOuter(c)
        | LeftSemi(c) | RightSemi(c) | LeftAnti(c) | RightAnti(c) => (c, None),
        AsOf {
            match_condition,
            constraint,
        } => (constraint, Some(match_condition)),
        _ => return Vec::new(),
    };

    let mut predicates: Vec<&Expr> = match_condition.into_iter().collect();
    if let JoinConstraint::On(expr) = constraint {
        predicates.push(expr);
    }
    predicates
}

/// Identifiers of an object name, with their quoting.
///
/// A computed part (e.g. Snowflake `IDENTIFIER(...)`) is kept as quoted text,
/// so it never compares equal to a plain name.
pub fn object_name_parts(name: &ObjectName) -> Vec<Identifier> {
    name.0
        .iter()
        .map(|part| match part.as_ident() {
            Some(ident) => Identifier::from(ident),
            None => Identifier::quoted(part.to_string()),
        })
        .collect()
}

/// Leading keyword of a statement, uppercase (e.g. `INSERT`, `DROP`).
pub fn statement_kind(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .map_or_else(|| "UNKNOWN".to_string(), str::to_ascii_uppercase)
}
