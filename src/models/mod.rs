//! Data models for the NL-to-SQL server.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;
pub mod schema;

// Re-export commonly used types
pub use query::{ExecutionResult, GeneratedQuery};
pub use schema::{
    ColumnEntry, IndexEntry, RelationshipEntry, RowCountEntry, SchemaSnapshot, SchemaSummary,
    TableEntry,
};
