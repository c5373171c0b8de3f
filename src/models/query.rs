//! Query-related data models.
//!
//! This module defines the generator's structured output and the executor's
//! result value.

use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Structured output of one SQL generation call.
///
/// Confidence is the model's self-reported score in [0, 1]. It carries no
/// independent verification and must only be used for ranking or display,
/// never as a correctness guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub sql: String,
    pub explanation: String,
    pub confidence: f64,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub tables_used: Vec<String>,
}

impl GeneratedQuery {
    /// Validate the shape constraints the generator promises its callers:
    /// non-empty SQL and confidence within [0, 1].
    pub fn validate(self) -> AgentResult<Self> {
        if self.sql.trim().is_empty() {
            return Err(AgentError::generation("model returned an empty SQL query"));
        }
        if !(0.0..=1.0).contains(&self.confidence) || self.confidence.is_nan() {
            return Err(AgentError::generation(format!(
                "model returned confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(self)
    }
}

/// Result of one execution attempt.
///
/// Execution failures are data, not errors: the executor sits at the leaf of
/// a conversational flow where "the query failed because ..." is more useful
/// than a propagated exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<serde_json::Map<String, JsonValue>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    pub executed_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Successful execution with decoded rows.
    pub fn ok(rows: Vec<serde_json::Map<String, JsonValue>>, executed_query: impl Into<String>) -> Self {
        let row_count = rows.len();
        Self {
            success: true,
            rows: Some(rows),
            row_count: Some(row_count),
            executed_query: executed_query.into(),
            error: None,
        }
    }

    /// Failed execution carrying the message and the query that was attempted.
    pub fn failed(error: impl Into<String>, executed_query: impl Into<String>) -> Self {
        Self {
            success: false,
            rows: None,
            row_count: None,
            executed_query: executed_query.into(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sql: &str, confidence: f64) -> GeneratedQuery {
        GeneratedQuery {
            sql: sql.to_string(),
            explanation: "test".to_string(),
            confidence,
            assumptions: Vec::new(),
            tables_used: Vec::new(),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_query() {
        assert!(query("SELECT 1", 0.9).validate().is_ok());
        assert!(query("SELECT 1", 0.0).validate().is_ok());
        assert!(query("SELECT 1", 1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_sql() {
        let err = query("   ", 0.9).validate().unwrap_err();
        assert!(matches!(err, AgentError::Generation { .. }));
    }

    #[test]
    fn test_validate_rejects_out_of_range_confidence() {
        assert!(query("SELECT 1", 1.5).validate().is_err());
        assert!(query("SELECT 1", -0.1).validate().is_err());
        assert!(query("SELECT 1", f64::NAN).validate().is_err());
    }

    #[test]
    fn test_execution_result_ok() {
        let mut row = serde_json::Map::new();
        row.insert("id".to_string(), JsonValue::Number(1.into()));

        let result = ExecutionResult::ok(vec![row], "SELECT id FROM users");
        assert!(result.success);
        assert_eq!(result.row_count, Some(1));
        assert_eq!(result.executed_query, "SELECT id FROM users");
        assert!(result.error.is_none());
    }

    #[test]
    fn test_execution_result_failed_echoes_query() {
        let result = ExecutionResult::failed("connection refused", "SELECT 1");
        assert!(!result.success);
        assert!(result.rows.is_none());
        assert_eq!(result.error.as_deref(), Some("connection refused"));
        assert_eq!(result.executed_query, "SELECT 1");
    }

    #[test]
    fn test_execution_result_serialization_skips_absent_fields() {
        let result = ExecutionResult::failed("boom", "SELECT 1");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(!json.contains("\"rows\""));
        assert!(!json.contains("row_count"));
    }

    #[test]
    fn test_generated_query_deserializes_with_missing_lists() {
        let json = r#"{"sql":"SELECT 1","explanation":"one","confidence":0.8}"#;
        let query: GeneratedQuery = serde_json::from_str(json).unwrap();
        assert!(query.assumptions.is_empty());
        assert!(query.tables_used.is_empty());
    }
}
