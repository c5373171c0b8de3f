//! Schema snapshot data models.
//!
//! One introspection call produces one immutable [`SchemaSnapshot`]. The
//! entry types mirror the catalog queries that feed them, so the describer
//! and the generator get compile-time guarantees on the fields they read.

use serde::{Deserialize, Serialize};

/// Immutable result of one schema introspection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableEntry>,
    pub columns: Vec<ColumnEntry>,
    pub relationships: Vec<RelationshipEntry>,
    pub indexes: Vec<IndexEntry>,
    pub row_counts: Vec<RowCountEntry>,
    pub summary: SchemaSummary,
}

impl SchemaSnapshot {
    /// Assemble a snapshot, deriving the summary counts.
    pub fn new(
        tables: Vec<TableEntry>,
        columns: Vec<ColumnEntry>,
        relationships: Vec<RelationshipEntry>,
        indexes: Vec<IndexEntry>,
        row_counts: Vec<RowCountEntry>,
    ) -> Self {
        let summary = SchemaSummary {
            total_tables: tables.len(),
            total_columns: columns.len(),
            total_relationships: relationships.len(),
            total_indexes: indexes.len(),
        };
        Self {
            tables,
            columns,
            relationships,
            indexes,
            row_counts,
            summary,
        }
    }

    /// Columns belonging to one table, in physical column order.
    pub fn columns_for(&self, schema: &str, table: &str) -> impl Iterator<Item = &ColumnEntry> {
        self.columns
            .iter()
            .filter(move |c| c.schema == schema && c.table == table)
    }

    /// Foreign keys declared on one table.
    pub fn relationships_for(
        &self,
        schema: &str,
        table: &str,
    ) -> impl Iterator<Item = &RelationshipEntry> {
        self.relationships
            .iter()
            .filter(move |r| r.schema == schema && r.table == table)
    }

    /// Indexes declared on one table.
    pub fn indexes_for(&self, schema: &str, table: &str) -> impl Iterator<Item = &IndexEntry> {
        self.indexes
            .iter()
            .filter(move |i| i.schema == schema && i.table == table)
    }

    /// Row count for one table, if the count pass recorded one.
    pub fn row_count_for(&self, schema: &str, table: &str) -> Option<&RowCountEntry> {
        self.row_counts
            .iter()
            .find(|rc| rc.schema == schema && rc.table == table)
    }
}

/// One user table, from `pg_tables`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub schema: String,
    pub name: String,
    pub owner: String,
}

impl TableEntry {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            owner: owner.into(),
        }
    }

    /// Schema-qualified table name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// One column, from `information_schema.columns` joined against the
/// PRIMARY KEY constraint usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnEntry {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Character length for varchar/char types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_precision: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_scale: Option<i32>,
    pub is_primary_key: bool,
}

impl ColumnEntry {
    /// Create a column entry with no length/precision/default metadata.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
        nullable: bool,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
            max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_primary_key: false,
        }
    }

    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.is_primary_key = is_pk;
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn with_max_length(mut self, max_length: i32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_numeric(mut self, precision: i32, scale: i32) -> Self {
        self.numeric_precision = Some(precision);
        self.numeric_scale = Some(scale);
        self
    }
}

/// One foreign-key column, from the constraint catalog join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipEntry {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub foreign_schema: String,
    pub foreign_table: String,
    pub foreign_column: String,
    pub constraint_name: String,
}

/// One index, from `pg_indexes`. The definition is the full CREATE INDEX
/// statement as Postgres reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub schema: String,
    pub table: String,
    pub index_name: String,
    pub definition: String,
}

/// Row count for one table. A failed `COUNT(*)` keeps the table in the
/// snapshot with count 0 and the failure message attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowCountEntry {
    pub schema: String,
    pub table: String,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RowCountEntry {
    pub fn counted(schema: impl Into<String>, table: impl Into<String>, count: i64) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            count,
            error: None,
        }
    }

    pub fn failed(
        schema: impl Into<String>,
        table: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Derived totals over a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub total_tables: usize,
    pub total_columns: usize,
    pub total_relationships: usize,
    pub total_indexes: usize,
}
