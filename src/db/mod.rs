//! Database access layer.
//!
//! This module provides the database-facing half of the pipeline:
//! - Scoped per-request connections with enforced timeouts
//! - Schema introspection
//! - Read-only query execution
//! - Postgres-to-JSON type mappings

pub mod connection;
pub mod executor;
pub mod introspect;
pub mod types;

pub use connection::ScopedConnection;
pub use executor::QueryExecutor;
pub use introspect::SchemaIntrospector;
