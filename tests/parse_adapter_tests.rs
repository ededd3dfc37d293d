mod support;

use sqlgate::output::reason::BlockReason;
use support::{assert_blocked, gateway};

fn nested_parens(depth: usize) -> String {
    format!("SELECT {}1{}", "(".repeat(depth), ")".repeat(depth))
}

fn nested_subqueries(depth: usize) -> String {
    let mut query = "SELECT 1".to_string();
    for _ in 0..depth {
        query = format!("SELECT * FROM ({query}) t");
    }
    query
}

#[test]
fn malformed_text_is_a_parse_error_at_every_level() {
    for level in ["schema_only", "aggregates", "full"] {
        let gateway = gateway(level, "postgresql");
        for query in ["SELEC 1", "SELECT * FROM", "SELECT (1", "SELECT 1 +", "'unterminated"] {
            assert_blocked(&gateway, query, BlockReason::ParseError);
        }
    }
}

#[test]
fn parse_errors_are_deterministic() {
    let gateway = gateway("full", "mysql");
    let first = gateway.validate_query_sync("SELECT * FROM WHERE id = 1");
    let second = gateway.validate_query_sync("SELECT * FROM WHERE id = 1");
    assert_eq!(first, second);
    assert_eq!(first.reason, Some(BlockReason::ParseError));
    assert!(first.detail.is_some());
}

#[test]
fn exactly_one_statement_is_accepted() {
    let gateway = gateway("full", "postgresql");
    assert_blocked(&gateway, "SELECT 1; SELECT 2", BlockReason::ParseError);
    assert_blocked(&gateway, ";", BlockReason::ParseError);
    assert_blocked(&gateway, "   ", BlockReason::ParseError);
    assert!(gateway.validate_query_sync("SELECT 1;").allowed);
}

#[test]
fn deep_expression_nesting_is_too_complex() {
    let gateway = gateway("full", "postgresql");
    assert!(gateway.validate_query_sync(&nested_parens(10)).allowed);
    assert_blocked(&gateway, &nested_parens(500), BlockReason::TooComplex);
}

#[test]
fn deep_subquery_nesting_is_too_complex() {
    let gateway = gateway("full", "postgresql");
    assert!(gateway.validate_query_sync(&nested_subqueries(5)).allowed);
    assert_blocked(&gateway, &nested_subqueries(200), BlockReason::TooComplex);
}

#[test]
fn dialect_decides_what_parses() {
    let query = "SELECT `id` FROM `users`";
    assert!(gateway("full", "mysql").validate_query_sync(query).allowed);
    assert_blocked(&gateway("full", "postgresql"), query, BlockReason::ParseError);
}
