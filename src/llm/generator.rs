//! SQL generation from natural language.
//!
//! Builds the system prompt (fixed rule preamble + rendered schema
//! document + response-shape instructions), asks the provider for a
//! structured completion, and parses the result into a
//! [`GeneratedQuery`]. No retries: a malformed response is a
//! [`AgentError::Generation`] and the retry decision belongs to the
//! caller.

use crate::describe::describe_schema;
use crate::error::{AgentError, AgentResult};
use crate::llm::provider::CompletionProvider;
use crate::models::{GeneratedQuery, SchemaSnapshot};
use tracing::info;

const PROMPT_HEADER: &str = "You are an expert PostgreSQL query generator. Given a database \
schema and a natural language question, generate an accurate SQL query.";

const QUERY_RULES: &str = "## Query Generation Rules:
1. Generate SELECT queries only (no INSERT, UPDATE, DELETE, DROP, etc.)
2. Use proper joins when querying multiple tables
3. Use table aliases for better readability
4. Always qualify column names with table aliases when joining
5. Use appropriate WHERE clauses for filtering
6. Use ORDER BY for sorting when relevant
7. Use LIMIT when appropriate to avoid returning too many rows
8. Use ILIKE for case-insensitive text searches
9. Consider performance - use indexes when available
10. Handle NULL values appropriately";

const RESPONSE_FORMAT: &str = "## Response Format:
Respond with a single JSON object containing exactly these fields:
- \"sql\": the generated SQL query
- \"explanation\": a clear explanation of what the query does
- \"confidence\": a number between 0 and 1
- \"assumptions\": an array of assumptions made while generating the query
- \"tables_used\": an array of the table names used
Respond with the JSON object only, no markdown fences.";

/// Converts natural language questions into SQL, grounded in a snapshot.
pub struct SqlGenerator<P: CompletionProvider> {
    provider: P,
}

impl<P: CompletionProvider> SqlGenerator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Generate a SQL query answering `question` against the schema in
    /// `snapshot`.
    pub async fn generate(
        &self,
        question: &str,
        snapshot: &SchemaSnapshot,
    ) -> AgentResult<GeneratedQuery> {
        if question.trim().is_empty() {
            return Err(AgentError::invalid_input("The question is empty"));
        }

        let system = build_system_prompt(snapshot);
        let value = self.provider.complete_structured(&system, question).await?;

        let query: GeneratedQuery = serde_json::from_value(value).map_err(|e| {
            AgentError::generation(format!("model response did not match the expected shape: {}", e))
        })?;
        let query = query.validate()?;

        info!(
            confidence = query.confidence,
            tables_used = ?query.tables_used,
            "SQL generated"
        );
        Ok(query)
    }
}

/// Assemble the full system prompt for one generation call.
pub fn build_system_prompt(snapshot: &SchemaSnapshot) -> String {
    format!(
        "{}\n\n{}\n{}\n\n{}",
        PROMPT_HEADER,
        describe_schema(snapshot),
        QUERY_RULES,
        RESPONSE_FORMAT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnEntry, RowCountEntry, TableEntry};
    use async_trait::async_trait;
    use serde_json::{Value as JsonValue, json};

    struct StubProvider {
        response: JsonValue,
    }

    #[async_trait]
    impl CompletionProvider for StubProvider {
        async fn complete_structured(&self, _system: &str, _user: &str) -> AgentResult<JsonValue> {
            Ok(self.response.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete_structured(&self, _system: &str, _user: &str) -> AgentResult<JsonValue> {
            Err(AgentError::generation("provider unavailable"))
        }
    }

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(
            vec![TableEntry::new("public", "users", "app")],
            vec![
                ColumnEntry::new("public", "users", "id", "integer", false).with_primary_key(true),
                ColumnEntry::new("public", "users", "email", "text", false),
            ],
            Vec::new(),
            Vec::new(),
            vec![RowCountEntry::counted("public", "users", 10)],
        )
    }

    #[tokio::test]
    async fn test_generate_parses_structured_response() {
        let generator = SqlGenerator::new(StubProvider {
            response: json!({
                "sql": "SELECT email FROM users ORDER BY id",
                "explanation": "Lists all user emails",
                "confidence": 0.92,
                "assumptions": ["emails are unique"],
                "tables_used": ["users"]
            }),
        });

        let query = generator.generate("list all emails", &snapshot()).await.unwrap();
        assert_eq!(query.sql, "SELECT email FROM users ORDER BY id");
        assert!((query.confidence - 0.92).abs() < f64::EPSILON);
        assert_eq!(query.tables_used, vec!["users"]);
    }

    #[tokio::test]
    async fn test_generate_rejects_shape_mismatch() {
        let generator = SqlGenerator::new(StubProvider {
            response: json!({ "query": "SELECT 1" }),
        });
        let err = generator.generate("anything", &snapshot()).await.unwrap_err();
        assert!(matches!(err, AgentError::Generation { .. }));
    }

    #[tokio::test]
    async fn test_generate_rejects_out_of_range_confidence() {
        let generator = SqlGenerator::new(StubProvider {
            response: json!({
                "sql": "SELECT 1",
                "explanation": "one",
                "confidence": 1.7,
                "assumptions": [],
                "tables_used": []
            }),
        });
        let err = generator.generate("anything", &snapshot()).await.unwrap_err();
        assert!(matches!(err, AgentError::Generation { .. }));
    }

    #[tokio::test]
    async fn test_generate_propagates_provider_failure() {
        let generator = SqlGenerator::new(FailingProvider);
        let err = generator.generate("anything", &snapshot()).await.unwrap_err();
        assert!(matches!(err, AgentError::Generation { .. }));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_question() {
        let generator = SqlGenerator::new(FailingProvider);
        let err = generator.generate("   ", &snapshot()).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput { .. }));
    }

    #[test]
    fn test_system_prompt_contains_schema_and_rules() {
        let prompt = build_system_prompt(&snapshot());
        assert!(prompt.contains("## Table: users"));
        assert!(prompt.contains("SELECT queries only"));
        assert!(prompt.contains("\"tables_used\""));
    }
}
