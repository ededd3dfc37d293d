mod support;

use sqlgate::output::reason::BlockReason;
use support::{assert_allowed, assert_blocked, gateway};

#[test]
fn aggregate_projections_are_allowed() {
    let gateway = gateway("aggregates", "postgresql");
    assert_allowed(&gateway, "SELECT COUNT(*) FROM users");
    assert_allowed(&gateway, "SELECT count(DISTINCT user_id), avg(total), min(total), max(total) FROM orders");
    assert_allowed(&gateway, "SELECT SUM(total) AS revenue FROM orders WHERE created_at > '2024-01-01'");
    assert_allowed(&gateway, "SELECT 1, 'label', count(*) FROM orders");
    assert_allowed(&gateway, "SELECT sum(total) / count(*) FROM orders");
}

#[test]
fn grouped_columns_are_allowed() {
    let gateway = gateway("aggregates", "postgresql");
    assert_allowed(&gateway, "SELECT dept, count(*) FROM employees GROUP BY dept");
    assert_allowed(&gateway, "SELECT e.dept, avg(e.salary) FROM employees e GROUP BY e.dept");
    assert_allowed(&gateway, "SELECT dept, count(*) FROM employees GROUP BY 1 HAVING count(*) > 5");
}

#[test]
fn raw_columns_are_blocked() {
    let gateway = gateway("aggregates", "postgresql");
    assert_blocked(&gateway, "SELECT email FROM users", BlockReason::RawColumnNotAllowed);
    assert_blocked(
        &gateway,
        "SELECT salary FROM employees WHERE id = 1",
        BlockReason::RawColumnNotAllowed,
    );
    assert_blocked(
        &gateway,
        "SELECT name, count(*) FROM employees GROUP BY dept",
        BlockReason::RawColumnNotAllowed,
    );
    assert_blocked(
        &gateway,
        "SELECT upper(email) FROM users",
        BlockReason::RawColumnNotAllowed,
    );
}

#[test]
fn group_by_all_grants_no_columns() {
    assert_blocked(
        &gateway("aggregates", "databricks"),
        "SELECT dept, count(*) FROM employees GROUP BY ALL",
        BlockReason::RawColumnNotAllowed,
    );
}

#[test]
fn wildcards_are_blocked() {
    let gateway = gateway("aggregates", "mysql");
    assert_blocked(&gateway, "SELECT * FROM users", BlockReason::WildcardSelectBlocked);
    assert_blocked(
        &gateway,
        "SELECT u.* FROM users u",
        BlockReason::WildcardSelectBlocked,
    );
}

#[test]
fn window_functions_are_blocked() {
    let gateway = gateway("aggregates", "postgresql");
    assert_blocked(
        &gateway,
        "SELECT AVG(salary) OVER (PARTITION BY dept) FROM employees",
        BlockReason::WindowFunctionBlocked,
    );
    assert_blocked(
        &gateway,
        "SELECT count(*) OVER () FROM employees",
        BlockReason::WindowFunctionBlocked,
    );
    assert_blocked(
        &gateway,
        "SELECT row_number() OVER w FROM employees WINDOW w AS (ORDER BY salary)",
        BlockReason::WindowFunctionBlocked,
    );
    assert_blocked(
        &gateway,
        "SELECT count(*) FROM employees ORDER BY rank() OVER (ORDER BY salary)",
        BlockReason::WindowFunctionBlocked,
    );
}

#[test]
fn nested_scopes_are_checked_under_the_same_rules() {
    let gateway = gateway("aggregates", "postgresql");
    assert_blocked(
        &gateway,
        "SELECT COUNT(*) FROM (SELECT email FROM users) t",
        BlockReason::RawColumnNotAllowed,
    );
    assert_blocked(
        &gateway,
        "WITH base AS (SELECT * FROM users) SELECT count(*) FROM base",
        BlockReason::WildcardSelectBlocked,
    );
    assert_blocked(
        &gateway,
        "SELECT count(*) FROM users UNION ALL SELECT salary FROM employees",
        BlockReason::RawColumnNotAllowed,
    );
    assert_blocked(
        &gateway,
        "SELECT count(*) FROM orders WHERE user_id IN (SELECT id FROM users)",
        BlockReason::RawColumnNotAllowed,
    );
    assert_allowed(
        &gateway,
        "SELECT (SELECT count(*) FROM users), count(*) FROM orders",
    );
}

#[test]
fn any_table_may_be_referenced() {
    let gateway = gateway("aggregates", "clickhouse");
    assert_allowed(&gateway, "SELECT count() FROM analytics.events");
    assert_allowed(&gateway, "SELECT uniq(user_id) FROM events WHERE event_date >= today() - 7");
}

#[test]
fn schema_qualified_aggregate_names_are_user_functions() {
    let gateway = gateway("aggregates", "postgresql");
    assert_blocked(
        &gateway,
        "SELECT public.count(email) FROM users",
        BlockReason::RawColumnNotAllowed,
    );
}
