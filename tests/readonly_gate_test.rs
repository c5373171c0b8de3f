//! Integration tests for the read-only safety gate.
//!
//! These tests verify the gate's contract end to end: only a single
//! SELECT statement passes, the original text is preserved, and every
//! known bypass shape (stacked statements, writable CTEs, SELECT INTO)
//! is rejected.

use nl2sql_server::error::AgentError;
use nl2sql_server::guard::authorize;

/// SELECT passes regardless of case and leading whitespace.
#[test]
fn test_gate_accepts_select_variants() {
    assert!(authorize("SELECT 1").is_ok());
    assert!(authorize("select * from users").is_ok());
    assert!(authorize("\n\t  SELECT id FROM users WHERE id = 1").is_ok());
}

/// Authorization echoes the input untouched; only the check normalizes.
#[test]
fn test_gate_preserves_original_text() {
    let authorized = authorize("  SELECT 1").unwrap();
    assert_eq!(authorized.as_str(), "  SELECT 1");
    assert_eq!(authorized.into_inner(), "  SELECT 1");
}

/// Every non-SELECT prefix from the contract table is rejected.
#[test]
fn test_gate_rejects_non_select_prefixes() {
    let cases = [
        "INSERT INTO users (name) VALUES ('x')",
        "UPDATE users SET name = 'x' WHERE id = 1",
        "DELETE FROM users WHERE id = 1",
        "DROP TABLE users",
        ";DROP TABLE users",
        "",
        "   \t\n",
    ];
    for sql in cases {
        let result = authorize(sql);
        assert!(
            matches!(result, Err(AgentError::UnsafeQuery { .. })),
            "expected rejection for {:?}",
            sql
        );
    }
}

/// A SELECT-prefixed string hiding a second statement is rejected outright.
#[test]
fn test_gate_rejects_stacked_statements() {
    assert!(authorize("SELECT 1; DROP TABLE users;").is_err());
    assert!(authorize("SELECT 1; SELECT 2").is_err());
}

/// PostgreSQL allows data-modifying CTEs; the gate does not.
#[test]
fn test_gate_rejects_writable_cte() {
    let result = authorize("WITH gone AS (DELETE FROM users RETURNING id) SELECT * FROM gone");
    assert!(result.is_err());
}

/// SELECT INTO creates a table and is rejected.
#[test]
fn test_gate_rejects_select_into() {
    assert!(authorize("SELECT * INTO copied FROM users").is_err());
}

/// Legitimate read shapes all pass: subqueries, unions, read-only CTEs,
/// aggregate queries, comments.
#[test]
fn test_gate_accepts_realistic_reads() {
    let cases = [
        "SELECT u.name, COUNT(o.id) FROM users u LEFT JOIN orders o ON o.user_id = u.id \
         GROUP BY u.name ORDER BY 2 DESC LIMIT 5",
        "WITH active AS (SELECT id FROM users WHERE active) SELECT COUNT(*) FROM active",
        "SELECT a FROM t1 UNION SELECT b FROM t2",
        "-- leading comment\nSELECT 1",
        "SELECT * FROM (SELECT id FROM users) AS sub",
    ];
    for sql in cases {
        assert!(authorize(sql).is_ok(), "expected acceptance for {:?}", sql);
    }
}

/// Rejection errors carry a reason a user can act on.
#[test]
fn test_gate_rejections_carry_reason() {
    let err = authorize("TRUNCATE users").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Unsafe query rejected"));
    assert!(message.contains("TRUNCATE"));
}
