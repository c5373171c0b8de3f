//! Turn orchestration.
//!
//! One conversational turn walks Introspecting -> Generating -> Gating ->
//! Executing -> Responding. The first four phases can halt the turn with a
//! phase-specific error; Executing cannot, because the executor reports
//! failure as data (see [`crate::db::executor`]). No phase retries: a user
//! who wants another attempt re-issues the question, which starts a fresh
//! turn.
//!
//! The schema snapshot is cached in the caller-owned
//! [`ConversationContext`], so a conversation introspects once and decides
//! its own staleness policy by invalidating the context.

use crate::config::{Timeouts, redact_url};
use crate::db::{QueryExecutor, SchemaIntrospector, ScopedConnection};
use crate::error::AgentResult;
use crate::guard;
use crate::llm::{CompletionProvider, SqlGenerator};
use crate::models::{ExecutionResult, GeneratedQuery, SchemaSnapshot};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Rows shown inline in the conversational reply. Full results travel in
/// the structured response alongside it.
const REPLY_PREVIEW_ROWS: usize = 10;

/// Pipeline phase, used for logging turn progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Introspecting,
    Generating,
    Gating,
    Executing,
    Responding,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Introspecting => write!(f, "introspecting"),
            Self::Generating => write!(f, "generating"),
            Self::Gating => write!(f, "gating"),
            Self::Executing => write!(f, "executing"),
            Self::Responding => write!(f, "responding"),
        }
    }
}

/// Per-conversation working context. Owns the cached snapshot so nothing
/// is shared across conversations.
#[derive(Default)]
pub struct ConversationContext {
    snapshot: Option<Arc<SchemaSnapshot>>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<&Arc<SchemaSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn cache_snapshot(&mut self, snapshot: Arc<SchemaSnapshot>) {
        self.snapshot = Some(snapshot);
    }

    /// Drop the cached snapshot, forcing the next turn to re-introspect.
    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }
}

/// Everything one completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub generated: GeneratedQuery,
    pub execution: ExecutionResult,
}

/// Sequences the pipeline components for conversational turns and for the
/// standalone introspect/generate/execute entry points.
pub struct QueryAgent<P: CompletionProvider> {
    introspector: SchemaIntrospector,
    generator: SqlGenerator<P>,
    executor: QueryExecutor,
    timeouts: Timeouts,
}

impl<P: CompletionProvider> QueryAgent<P> {
    pub fn new(provider: P, timeouts: Timeouts) -> Self {
        Self {
            introspector: SchemaIntrospector::new(timeouts),
            generator: SqlGenerator::new(provider),
            executor: QueryExecutor::new(timeouts),
            timeouts,
        }
    }

    /// Run one full conversational turn.
    pub async fn run_turn(
        &self,
        ctx: &mut ConversationContext,
        question: &str,
        connection_string: &str,
    ) -> AgentResult<TurnOutcome> {
        let turn_id = Uuid::new_v4();
        info!(
            turn_id = %turn_id,
            database = %redact_url(connection_string),
            "Turn started"
        );

        let snapshot = match ctx.snapshot() {
            Some(snapshot) => {
                debug!(turn_id = %turn_id, "Reusing cached schema snapshot");
                Arc::clone(snapshot)
            }
            None => {
                info!(turn_id = %turn_id, phase = %TurnPhase::Introspecting, "Introspecting schema");
                let snapshot = Arc::new(self.introspector.introspect(connection_string).await?);
                ctx.cache_snapshot(Arc::clone(&snapshot));
                snapshot
            }
        };

        info!(turn_id = %turn_id, phase = %TurnPhase::Generating, "Generating SQL");
        let generated = self.generator.generate(question, &snapshot).await?;

        info!(turn_id = %turn_id, phase = %TurnPhase::Gating, "Checking generated SQL");
        let authorized = guard::authorize(&generated.sql)?;

        info!(turn_id = %turn_id, phase = %TurnPhase::Executing, "Executing query");
        let execution = self
            .executor
            .execute(connection_string, authorized.as_str())
            .await;

        debug!(turn_id = %turn_id, phase = %TurnPhase::Responding, success = execution.success, "Formatting reply");
        let reply = format_reply(&generated, &execution);

        Ok(TurnOutcome {
            reply,
            generated,
            execution,
        })
    }

    /// Introspect without generating or executing.
    pub async fn introspect(&self, connection_string: &str) -> AgentResult<SchemaSnapshot> {
        self.introspector.introspect(connection_string).await
    }

    /// Introspect and generate SQL without executing it.
    pub async fn generate(
        &self,
        question: &str,
        connection_string: &str,
    ) -> AgentResult<GeneratedQuery> {
        let snapshot = self.introspector.introspect(connection_string).await?;
        self.generator.generate(question, &snapshot).await
    }

    /// Gate and execute caller-supplied SQL, bypassing generation but
    /// never the safety check. The gate raises here so the surrounding
    /// layer can report a security rejection; the executor's own re-check
    /// covers any other route to it.
    pub async fn execute(
        &self,
        connection_string: &str,
        sql: &str,
    ) -> AgentResult<ExecutionResult> {
        let authorized = guard::authorize(sql)?;
        Ok(self
            .executor
            .execute(connection_string, authorized.as_str())
            .await)
    }

    /// Open a connection, run `SELECT 1`, close. Used by the
    /// connection-test endpoint.
    pub async fn test_connection(&self, connection_string: &str) -> AgentResult<()> {
        let mut conn = ScopedConnection::open(connection_string, self.timeouts).await?;
        conn.ping().await?;
        conn.close().await;
        Ok(())
    }
}

/// Format the user-facing reply for one turn. Cites the SQL, the model's
/// confidence and assumptions, and narrates failure conversationally.
/// Connection details never appear here.
fn format_reply(generated: &GeneratedQuery, execution: &ExecutionResult) -> String {
    let mut reply = String::new();

    reply.push_str(&generated.explanation);
    reply.push_str("\n\n```sql\n");
    reply.push_str(&generated.sql);
    reply.push_str("\n```\n");

    reply.push_str(&format!(
        "\nConfidence: {:.0}%\n",
        generated.confidence * 100.0
    ));

    if !generated.assumptions.is_empty() {
        reply.push_str("\nAssumptions:\n");
        for assumption in &generated.assumptions {
            reply.push_str(&format!("- {}\n", assumption));
        }
    }

    match (&execution.rows, execution.success) {
        (Some(rows), true) => {
            let row_count = execution.row_count.unwrap_or(rows.len());
            if rows.is_empty() {
                reply.push_str("\nThe query ran successfully and returned no rows.\n");
            } else {
                reply.push_str(&format!(
                    "\nThe query returned {} row{}.\n",
                    row_count,
                    if row_count == 1 { "" } else { "s" }
                ));
                let preview: Vec<_> = rows.iter().take(REPLY_PREVIEW_ROWS).collect();
                if let Ok(rendered) = serde_json::to_string_pretty(&preview) {
                    reply.push_str("\n```json\n");
                    reply.push_str(&rendered);
                    reply.push_str("\n```\n");
                }
                if row_count > REPLY_PREVIEW_ROWS {
                    reply.push_str(&format!(
                        "(showing the first {} rows)\n",
                        REPLY_PREVIEW_ROWS
                    ));
                }
            }
        }
        _ => {
            let message = execution.error.as_deref().unwrap_or("unknown error");
            reply.push_str(&format!("\nThe query failed: {}\n", message));
        }
    }

    reply
}
