//! Schema introspection.
//!
//! One call runs four catalog queries (tables, columns, foreign keys,
//! indexes) plus a per-table `COUNT(*)` pass, all on a single scoped
//! connection, and assembles the result into a [`SchemaSnapshot`].
//!
//! Catalog query failures are structural: any of the four failing aborts
//! the introspection. Row-count failures are not: a table whose count
//! query fails stays in the snapshot with count 0 and the error message
//! attached.

use crate::config::Timeouts;
use crate::db::connection::ScopedConnection;
use crate::error::{AgentError, AgentResult};
use crate::models::{
    ColumnEntry, IndexEntry, RelationshipEntry, RowCountEntry, SchemaSnapshot, TableEntry,
};
use sqlx::Row;
use tracing::{debug, warn};

// =============================================================================
// Catalog queries
// =============================================================================
//
// System schemas are excluded everywhere; ordering is fixed so identical
// database schemas always produce identical snapshots.

mod queries {
    pub const TABLES: &str = r#"
        SELECT
            schemaname AS schema_name,
            tablename AS table_name,
            tableowner AS table_owner
        FROM pg_tables
        WHERE schemaname NOT IN ('information_schema', 'pg_catalog')
        ORDER BY schemaname, tablename
        "#;

    pub const COLUMNS: &str = r#"
        SELECT
            c.table_schema AS schema_name,
            c.table_name,
            c.column_name,
            c.data_type,
            c.is_nullable,
            c.column_default,
            c.character_maximum_length,
            c.numeric_precision,
            c.numeric_scale,
            CASE
                WHEN pk.column_name IS NOT NULL THEN true
                ELSE false
            END AS is_primary_key
        FROM information_schema.columns c
        LEFT JOIN (
            SELECT ku.table_schema, ku.table_name, ku.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage ku
                ON tc.constraint_name = ku.constraint_name
                AND tc.table_schema = ku.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
        ) pk
            ON c.table_schema = pk.table_schema
            AND c.table_name = pk.table_name
            AND c.column_name = pk.column_name
        WHERE c.table_schema NOT IN ('information_schema', 'pg_catalog')
        ORDER BY c.table_schema, c.table_name, c.ordinal_position
        "#;

    pub const RELATIONSHIPS: &str = r#"
        SELECT
            tc.table_schema AS schema_name,
            tc.table_name,
            kcu.column_name,
            ccu.table_schema AS foreign_schema_name,
            ccu.table_name AS foreign_table_name,
            ccu.column_name AS foreign_column_name,
            tc.constraint_name
        FROM information_schema.table_constraints AS tc
        JOIN information_schema.key_column_usage AS kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        JOIN information_schema.constraint_column_usage AS ccu
            ON ccu.constraint_name = tc.constraint_name
        WHERE tc.constraint_type = 'FOREIGN KEY'
            AND tc.table_schema NOT IN ('information_schema', 'pg_catalog')
        ORDER BY tc.table_schema, tc.table_name, kcu.column_name
        "#;

    pub const INDEXES: &str = r#"
        SELECT
            schemaname AS schema_name,
            tablename AS table_name,
            indexname AS index_name,
            indexdef AS index_definition
        FROM pg_indexes
        WHERE schemaname NOT IN ('information_schema', 'pg_catalog')
        ORDER BY schemaname, tablename, indexname
        "#;
}

/// Schema introspector producing one snapshot per call.
pub struct SchemaIntrospector {
    timeouts: Timeouts,
}

impl SchemaIntrospector {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }

    /// Introspect the database behind `connection_string`.
    ///
    /// The connection is opened for this call only and closed whether the
    /// pass completes or fails partway through.
    pub async fn introspect(&self, connection_string: &str) -> AgentResult<SchemaSnapshot> {
        let mut conn = ScopedConnection::open(connection_string, self.timeouts).await?;

        let tables = fetch_tables(&mut conn).await?;
        let columns = fetch_columns(&mut conn).await?;
        let relationships = fetch_relationships(&mut conn).await?;
        let indexes = fetch_indexes(&mut conn).await?;
        let row_counts = fetch_row_counts(&mut conn, &tables).await;

        conn.close().await;

        let snapshot = SchemaSnapshot::new(tables, columns, relationships, indexes, row_counts);
        debug!(
            tables = snapshot.summary.total_tables,
            columns = snapshot.summary.total_columns,
            relationships = snapshot.summary.total_relationships,
            indexes = snapshot.summary.total_indexes,
            "Introspection completed"
        );
        Ok(snapshot)
    }
}

async fn fetch_tables(conn: &mut ScopedConnection) -> AgentResult<Vec<TableEntry>> {
    let rows = conn
        .fetch_all(queries::TABLES)
        .await
        .map_err(|e| structural("tables", e))?;

    Ok(rows
        .iter()
        .map(|row| {
            TableEntry::new(
                row.get::<String, _>("schema_name"),
                row.get::<String, _>("table_name"),
                row.get::<String, _>("table_owner"),
            )
        })
        .collect())
}

async fn fetch_columns(conn: &mut ScopedConnection) -> AgentResult<Vec<ColumnEntry>> {
    let rows = conn
        .fetch_all(queries::COLUMNS)
        .await
        .map_err(|e| structural("columns", e))?;

    Ok(rows
        .iter()
        .map(|row| {
            let nullable: String = row.get("is_nullable");
            let mut col = ColumnEntry::new(
                row.get::<String, _>("schema_name"),
                row.get::<String, _>("table_name"),
                row.get::<String, _>("column_name"),
                row.get::<String, _>("data_type"),
                nullable == "YES",
            )
            .with_primary_key(row.get("is_primary_key"));

            if let Ok(Some(default)) = row.try_get::<Option<String>, _>("column_default") {
                col = col.with_default(default);
            }
            if let Ok(Some(len)) = row.try_get::<Option<i32>, _>("character_maximum_length") {
                col = col.with_max_length(len);
            }
            let precision = row.try_get::<Option<i32>, _>("numeric_precision").ok().flatten();
            let scale = row.try_get::<Option<i32>, _>("numeric_scale").ok().flatten();
            if let (Some(p), Some(s)) = (precision, scale) {
                col = col.with_numeric(p, s);
            }
            col
        })
        .collect())
}

async fn fetch_relationships(conn: &mut ScopedConnection) -> AgentResult<Vec<RelationshipEntry>> {
    let rows = conn
        .fetch_all(queries::RELATIONSHIPS)
        .await
        .map_err(|e| structural("relationships", e))?;

    Ok(rows
        .iter()
        .map(|row| RelationshipEntry {
            schema: row.get("schema_name"),
            table: row.get("table_name"),
            column: row.get("column_name"),
            foreign_schema: row.get("foreign_schema_name"),
            foreign_table: row.get("foreign_table_name"),
            foreign_column: row.get("foreign_column_name"),
            constraint_name: row.get("constraint_name"),
        })
        .collect())
}

async fn fetch_indexes(conn: &mut ScopedConnection) -> AgentResult<Vec<IndexEntry>> {
    let rows = conn
        .fetch_all(queries::INDEXES)
        .await
        .map_err(|e| structural("indexes", e))?;

    Ok(rows
        .iter()
        .map(|row| IndexEntry {
            schema: row.get("schema_name"),
            table: row.get("table_name"),
            index_name: row.get("index_name"),
            definition: row.get("index_definition"),
        })
        .collect())
}

/// Count rows table by table on the shared connection. Failures stay local
/// to their table: every discovered table gets exactly one entry.
async fn fetch_row_counts(
    conn: &mut ScopedConnection,
    tables: &[TableEntry],
) -> Vec<RowCountEntry> {
    let mut counts = Vec::with_capacity(tables.len());
    for table in tables {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {}.{}",
            quote_ident(&table.schema),
            quote_ident(&table.name)
        );
        match conn.fetch_one(&sql).await {
            Ok(row) => {
                counts.push(RowCountEntry::counted(
                    &table.schema,
                    &table.name,
                    row.get::<i64, _>("count"),
                ));
            }
            Err(e) => {
                warn!(
                    table = %table.qualified_name(),
                    error = %e,
                    "Row count failed"
                );
                counts.push(RowCountEntry::failed(
                    &table.schema,
                    &table.name,
                    e.to_string(),
                ));
            }
        }
    }
    counts
}

fn structural(phase: &str, err: AgentError) -> AgentError {
    AgentError::introspection(phase, err.to_string())
}

/// Double-quote an identifier, escaping embedded quotes.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
