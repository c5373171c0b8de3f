//! Read-only enforcement for SQL statements.
//!
//! Every statement headed for execution passes through [`authorize`],
//! whether it came from the generator or straight from a user. The check
//! is a real parse, not a prefix test: the input must be exactly one
//! statement, that statement must be a SELECT, and the query tree must
//! contain no data-modifying clause (writable CTEs, `SELECT INTO`).
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) with the PostgreSQL
//! dialect, so formatting tricks, stacked statements, and comment-hidden
//! mutations cannot slip past validation.
//!
//! Authorization never alters the SQL: [`AuthorizedSql`] wraps the
//! original text byte for byte, and only the check itself is
//! case/whitespace-insensitive.

use crate::error::{AgentError, AgentResult};
use sqlparser::ast::{Query, SetExpr, Statement, TableFactor};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// A statement that passed the read-only check, original text preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedSql(String);

impl AuthorizedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for AuthorizedSql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authorize a statement for read-only execution.
pub fn authorize(sql: &str) -> AgentResult<AuthorizedSql> {
    if sql.trim().is_empty() {
        return Err(AgentError::unsafe_query("the statement is empty"));
    }

    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql).map_err(|e| {
        AgentError::unsafe_query(format!("the statement could not be parsed: {}", e))
    })?;

    match statements.as_slice() {
        [] => Err(AgentError::unsafe_query("the statement is empty")),
        [Statement::Query(query)] => {
            inspect_query(query, true).map_err(AgentError::unsafe_query)?;
            Ok(AuthorizedSql(sql.to_string()))
        }
        [stmt] => Err(AgentError::unsafe_query(format!(
            "statement is not a SELECT (found {})",
            statement_kind(stmt)
        ))),
        many => Err(AgentError::unsafe_query(format!(
            "expected exactly one statement, found {}",
            many.len()
        ))),
    }
}

/// Walk a query tree rejecting anything that writes. CTE bodies are where
/// PostgreSQL permits data-modifying statements inside a SELECT, so they
/// are inspected recursively along with set-operation arms and derived
/// tables.
fn inspect_query(query: &Query, top_level: bool) -> Result<(), String> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            inspect_query(&cte.query, false)?;
        }
    }
    inspect_set_expr(&query.body, top_level)
}

fn inspect_set_expr(body: &SetExpr, top_level: bool) -> Result<(), String> {
    match body {
        SetExpr::Select(select) => {
            if select.into.is_some() {
                return Err("SELECT INTO creates a table".to_string());
            }
            for table in &select.from {
                inspect_table_factor(&table.relation)?;
                for join in &table.joins {
                    inspect_table_factor(&join.relation)?;
                }
            }
            Ok(())
        }
        SetExpr::Query(inner) => inspect_query(inner, top_level),
        SetExpr::SetOperation { left, right, .. } => {
            inspect_set_expr(left, top_level)?;
            inspect_set_expr(right, top_level)
        }
        SetExpr::Values(_) if !top_level => Ok(()),
        SetExpr::Values(_) => Err("statement is not a SELECT".to_string()),
        _ => Err("the query contains a data-modifying clause".to_string()),
    }
}

fn inspect_table_factor(relation: &TableFactor) -> Result<(), String> {
    match relation {
        TableFactor::Derived { subquery, .. } => inspect_query(subquery, false),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            inspect_table_factor(&table_with_joins.relation)?;
            for join in &table_with_joins.joins {
                inspect_table_factor(&join.relation)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Short operation name for rejection messages.
fn statement_kind(stmt: &Statement) -> &'static str {
    match stmt {
        Statement::Insert(_) => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete(_) => "DELETE",
        Statement::Drop { .. } => "DROP",
        Statement::Truncate { .. } => "TRUNCATE",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::AlterTable { .. } => "ALTER TABLE",
        Statement::StartTransaction { .. } => "BEGIN",
        Statement::Commit { .. } => "COMMIT",
        Statement::Rollback { .. } => "ROLLBACK",
        Statement::Grant { .. } => "GRANT",
        Statement::Revoke { .. } => "REVOKE",
        Statement::Call { .. } => "CALL",
        Statement::Explain { .. } => "EXPLAIN",
        Statement::Copy { .. } => "COPY",
        _ => "a non-SELECT statement",
    }
}
