//! Error types for the NL-to-SQL pipeline.
//!
//! This module defines all error types using `thiserror` for ergonomic error
//! handling. Each variant corresponds to one failing phase of the pipeline,
//! so the orchestrator can report which step broke without exposing raw
//! driver output (which may embed the connection string).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    QueryTimeout { operation: String, elapsed_secs: u64 },

    #[error("Schema introspection failed ({phase}): {message}")]
    Introspection { phase: String, message: String },

    #[error("SQL generation failed: {message}")]
    Generation { message: String },

    #[error("Unsafe query rejected: {reason}")]
    UnsafeQuery { reason: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AgentError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn query_timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::QueryTimeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an introspection error naming the catalog query that failed.
    pub fn introspection(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Introspection {
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create an unsafe query error.
    pub fn unsafe_query(reason: impl Into<String>) -> Self {
        Self::UnsafeQuery {
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable by re-issuing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::QueryTimeout { .. })
    }

    /// Conversational message naming the failing phase. Deliberately omits
    /// driver detail, which may contain the connection string.
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection { suggestion, .. } => {
                format!("I could not connect to the database. {}.", suggestion)
            }
            Self::QueryTimeout {
                operation,
                elapsed_secs,
            } => format!(
                "The database did not answer in time ({} exceeded {}s).",
                operation, elapsed_secs
            ),
            Self::Introspection { .. } => {
                "I could not read the database schema. Check that the connection has \
                 access to the catalog tables."
                    .to_string()
            }
            Self::Generation { .. } => {
                "I could not turn that question into a SQL query. Try rephrasing it.".to_string()
            }
            Self::UnsafeQuery { reason } => format!(
                "That query was rejected by the read-only safety check: {}",
                reason
            ),
            Self::InvalidInput { message } => message.clone(),
            Self::Internal { .. } => "Something went wrong on my side.".to_string(),
        }
    }
}

/// Convert sqlx errors to AgentError.
impl From<sqlx::Error> for AgentError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => AgentError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| format!(" (SQLSTATE: {})", c));
                AgentError::internal(format!(
                    "Database error: {}{}",
                    db_err.message(),
                    code.unwrap_or_default()
                ))
            }
            sqlx::Error::Io(io_err) => AgentError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => AgentError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => AgentError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::PoolTimedOut => AgentError::query_timeout("connection acquire", 30),
            sqlx::Error::ColumnNotFound(col) => {
                AgentError::internal(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                AgentError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                AgentError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => AgentError::internal("Database worker crashed"),
            _ => AgentError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for pipeline operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = AgentError::connection("refused", "Check that the server is running");
        assert_eq!(err.suggestion(), Some("Check that the server is running"));
        assert!(AgentError::generation("bad response").suggestion().is_none());
    }

    #[test]
    fn test_error_retryable() {
        assert!(AgentError::query_timeout("query", 60).is_retryable());
        assert!(AgentError::connection("err", "sugg").is_retryable());
        assert!(!AgentError::unsafe_query("not a SELECT").is_retryable());
        assert!(!AgentError::generation("parse failure").is_retryable());
    }

    #[test]
    fn test_user_message_names_phase_without_driver_detail() {
        let err = AgentError::introspection(
            "columns",
            "error returned from database: password authentication failed for user \"admin\"",
        );
        let msg = err.user_message();
        assert!(msg.contains("schema"));
        assert!(!msg.contains("password"));
    }

    #[test]
    fn test_user_message_unsafe_query_includes_reason() {
        let err = AgentError::unsafe_query("statement is not a SELECT");
        assert!(err.user_message().contains("statement is not a SELECT"));
    }

    #[test]
    fn test_sqlx_configuration_maps_to_connection() {
        let err: AgentError = sqlx::Error::Configuration("bad url".into()).into();
        assert!(matches!(err, AgentError::Connection { .. }));
    }
}
