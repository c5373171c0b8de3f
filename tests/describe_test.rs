//! Integration tests for schema document rendering.

use nl2sql_server::describe::describe_schema;
use nl2sql_server::models::{
    ColumnEntry, IndexEntry, RelationshipEntry, RowCountEntry, SchemaSnapshot, TableEntry,
};

fn two_table_snapshot() -> SchemaSnapshot {
    SchemaSnapshot::new(
        vec![
            TableEntry::new("public", "orders", "app"),
            TableEntry::new("public", "users", "app"),
        ],
        vec![
            ColumnEntry::new("public", "orders", "id", "integer", false).with_primary_key(true),
            ColumnEntry::new("public", "orders", "user_id", "integer", false),
            ColumnEntry::new("public", "orders", "total", "numeric", true).with_numeric(12, 2),
            ColumnEntry::new("public", "users", "id", "int", false).with_primary_key(true),
            ColumnEntry::new("public", "users", "email", "text", false),
        ],
        vec![RelationshipEntry {
            schema: "public".to_string(),
            table: "orders".to_string(),
            column: "user_id".to_string(),
            foreign_schema: "public".to_string(),
            foreign_table: "users".to_string(),
            foreign_column: "id".to_string(),
            constraint_name: "orders_user_id_fkey".to_string(),
        }],
        vec![IndexEntry {
            schema: "public".to_string(),
            table: "users".to_string(),
            index_name: "users_pkey".to_string(),
            definition: "CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id)"
                .to_string(),
        }],
        vec![
            RowCountEntry::counted("public", "orders", 120),
            RowCountEntry::counted("public", "users", 42),
        ],
    )
}

/// A single table with a primary key and a NOT NULL column renders the
/// documented literal lines, and no Foreign Keys section appears.
#[test]
fn test_single_table_document_lines() {
    let snapshot = SchemaSnapshot::new(
        vec![TableEntry::new("public", "users", "app")],
        vec![
            ColumnEntry::new("public", "users", "id", "int", false).with_primary_key(true),
            ColumnEntry::new("public", "users", "email", "text", false),
        ],
        Vec::new(),
        Vec::new(),
        Vec::new(),
    );

    let doc = describe_schema(&snapshot);
    assert!(doc.contains("## Table: users"));
    assert!(doc.contains("- **id** (int) [PRIMARY KEY]"));
    assert!(doc.contains("- **email** (text) [NOT NULL]"));
    assert!(!doc.contains("Foreign Keys"));
}

/// Same snapshot in, identical bytes out.
#[test]
fn test_description_is_byte_identical_across_calls() {
    let snapshot = two_table_snapshot();
    let first = describe_schema(&snapshot);
    let second = describe_schema(&snapshot);
    assert_eq!(first, second);

    // A structural clone renders identically too.
    let cloned = snapshot.clone();
    assert_eq!(first, describe_schema(&cloned));
}

/// The full document carries every section in snapshot order.
#[test]
fn test_full_document_structure() {
    let doc = describe_schema(&two_table_snapshot());

    let orders_pos = doc.find("## Table: orders").unwrap();
    let users_pos = doc.find("## Table: users").unwrap();
    assert!(orders_pos < users_pos, "tables render in snapshot order");

    assert!(doc.starts_with("# Database Schema\n\n"));
    assert!(doc.contains("Row Count: 120"));
    assert!(doc.contains("Row Count: 42"));
    assert!(doc.contains("- **total** (numeric(12,2))"));
    assert!(doc.contains("- user_id -> public.users.id"));
    assert!(doc.contains("### Indexes:\n- users_pkey"));
}

/// Tables whose count failed still render, just without a row count line.
#[test]
fn test_document_tolerates_failed_row_counts() {
    let snapshot = SchemaSnapshot::new(
        vec![TableEntry::new("public", "locked", "app")],
        vec![ColumnEntry::new("public", "locked", "id", "integer", false)],
        Vec::new(),
        Vec::new(),
        vec![RowCountEntry::failed("public", "locked", "permission denied")],
    );
    let doc = describe_schema(&snapshot);
    assert!(doc.contains("## Table: locked"));
    assert!(!doc.contains("Row Count"));
}
