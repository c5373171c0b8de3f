//! HTTP transport for the pipeline.
//!
//! Thin axum surface over the agent: five JSON endpoints mirroring the
//! pipeline entry points. Executor-level failures travel inside a 200
//! response as `success: false`; connection/introspection/generation
//! failures and gate rejections map to HTTP error statuses here.

use crate::agent::{ConversationContext, QueryAgent};
use crate::config::redact_url;
use crate::error::{AgentError, AgentResult};
use crate::llm::CompletionProvider;
use crate::models::{ExecutionResult, GeneratedQuery, SchemaSnapshot};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// Shared state handed to every handler.
pub struct AppState<P: CompletionProvider> {
    agent: Arc<QueryAgent<P>>,
    default_database_url: Option<String>,
}

impl<P: CompletionProvider> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            agent: Arc::clone(&self.agent),
            default_database_url: self.default_database_url.clone(),
        }
    }
}

impl<P: CompletionProvider> AppState<P> {
    fn resolve_connection_string(&self, requested: Option<String>) -> Result<String, ApiError> {
        requested
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.default_database_url.clone())
            .ok_or_else(|| {
                ApiError(AgentError::invalid_input(
                    "A connection string is required (none supplied and no default configured)",
                ))
            })
    }
}

/// HTTP transport wrapping the agent.
pub struct HttpServer<P: CompletionProvider> {
    state: AppState<P>,
    host: String,
    port: u16,
}

impl<P: CompletionProvider + 'static> HttpServer<P> {
    pub fn new(
        agent: Arc<QueryAgent<P>>,
        default_database_url: Option<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            state: AppState {
                agent,
                default_database_url,
            },
            host: host.into(),
            port,
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the application router.
    pub fn router(state: AppState<P>) -> Router {
        Router::new()
            .route("/api/database/query", post(query::<P>))
            .route("/api/database/test-connection", post(test_connection::<P>))
            .route("/api/database/introspect", post(introspect::<P>))
            .route("/api/database/generate-sql", post(generate_sql::<P>))
            .route("/api/database/execute-sql", post(execute_sql::<P>))
            .with_state(state)
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn run(self) -> AgentResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting HTTP server on {}", bind_addr);

        let app = Self::router(self.state);
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            AgentError::internal(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_signal())
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server error");
                AgentError::internal(format!("HTTP server error: {}", e))
            })?;

        info!("HTTP server stopped");
        Ok(())
    }
}

// =============================================================================
// Request / Response bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub connection_string: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub reply: String,
    pub generated_query: GeneratedQuery,
    pub execution: ExecutionResult,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionRequest {
    #[serde(default)]
    pub connection_string: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub question: String,
    #[serde(default)]
    pub connection_string: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub query: String,
    #[serde(default)]
    pub connection_string: Option<String>,
}

// =============================================================================
// Error mapping
// =============================================================================

/// Wrapper mapping pipeline errors onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub AgentError);

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AgentError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AgentError::UnsafeQuery { .. } => StatusCode::FORBIDDEN,
            AgentError::Connection { .. }
            | AgentError::Introspection { .. }
            | AgentError::Generation { .. } => StatusCode::BAD_GATEWAY,
            AgentError::QueryTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AgentError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(status = %status, error = %self.0, "Request failed");
        let body = serde_json::json!({ "error": self.0.user_message() });
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn query<P: CompletionProvider>(
    State(state): State<AppState<P>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let connection_string = state.resolve_connection_string(request.connection_string)?;
    info!(database = %redact_url(&connection_string), "Query turn requested");

    // The HTTP surface is stateless, so every request is its own
    // conversation; callers that keep a conversation alive hold the
    // context on their side of the boundary.
    let mut ctx = ConversationContext::new();
    let outcome = state
        .agent
        .run_turn(&mut ctx, &request.question, &connection_string)
        .await?;

    Ok(Json(QueryResponse {
        reply: outcome.reply,
        generated_query: outcome.generated,
        execution: outcome.execution,
    }))
}

async fn test_connection<P: CompletionProvider>(
    State(state): State<AppState<P>>,
    Json(request): Json<ConnectionRequest>,
) -> Result<Json<TestConnectionResponse>, ApiError> {
    let connection_string = state.resolve_connection_string(request.connection_string)?;

    match state.agent.test_connection(&connection_string).await {
        Ok(()) => Ok(Json(TestConnectionResponse {
            success: true,
            message: Some("Database connection successful".to_string()),
            error: None,
        })),
        Err(e) => Ok(Json(TestConnectionResponse {
            success: false,
            message: None,
            error: Some(e.user_message()),
        })),
    }
}

async fn introspect<P: CompletionProvider>(
    State(state): State<AppState<P>>,
    Json(request): Json<ConnectionRequest>,
) -> Result<Json<DataResponse<SchemaSnapshot>>, ApiError> {
    let connection_string = state.resolve_connection_string(request.connection_string)?;
    let snapshot = state.agent.introspect(&connection_string).await?;
    Ok(Json(DataResponse {
        success: true,
        data: snapshot,
    }))
}

async fn generate_sql<P: CompletionProvider>(
    State(state): State<AppState<P>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<DataResponse<GeneratedQuery>>, ApiError> {
    let connection_string = state.resolve_connection_string(request.connection_string)?;
    let generated = state
        .agent
        .generate(&request.question, &connection_string)
        .await?;
    Ok(Json(DataResponse {
        success: true,
        data: generated,
    }))
}

async fn execute_sql<P: CompletionProvider>(
    State(state): State<AppState<P>>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let connection_string = state.resolve_connection_string(request.connection_string)?;
    let result = state
        .agent
        .execute(&connection_string, &request.query)
        .await?;
    Ok(Json(result))
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use async_trait::async_trait;
    use serde_json::Value as JsonValue;

    struct NullProvider;

    #[async_trait]
    impl CompletionProvider for NullProvider {
        async fn complete_structured(
            &self,
            _system: &str,
            _user: &str,
        ) -> AgentResult<JsonValue> {
            Err(AgentError::generation("not configured"))
        }
    }

    fn state(default_url: Option<&str>) -> AppState<NullProvider> {
        AppState {
            agent: Arc::new(QueryAgent::new(NullProvider, Timeouts::default())),
            default_database_url: default_url.map(String::from),
        }
    }

    #[test]
    fn test_resolve_connection_string_prefers_request() {
        let state = state(Some("postgres://default-host/db"));
        let resolved = state
            .resolve_connection_string(Some("postgres://request-host/db".to_string()))
            .unwrap();
        assert_eq!(resolved, "postgres://request-host/db");
    }

    #[test]
    fn test_resolve_connection_string_falls_back_to_default() {
        let state = state(Some("postgres://default-host/db"));
        assert_eq!(
            state.resolve_connection_string(None).unwrap(),
            "postgres://default-host/db"
        );
        // Blank request strings do not shadow the default.
        assert_eq!(
            state
                .resolve_connection_string(Some("  ".to_string()))
                .unwrap(),
            "postgres://default-host/db"
        );
    }

    #[test]
    fn test_resolve_connection_string_errors_without_any() {
        let state = state(None);
        let err = state.resolve_connection_string(None).unwrap_err();
        assert!(matches!(err.0, AgentError::InvalidInput { .. }));
    }

    #[test]
    fn test_router_builds() {
        let _router = HttpServer::router(state(None));
    }

    #[test]
    fn test_server_bind_addr() {
        let agent = Arc::new(QueryAgent::new(NullProvider, Timeouts::default()));
        let server = HttpServer::new(agent, None, "0.0.0.0", 3000);
        assert_eq!(server.bind_addr(), "0.0.0.0:3000");
    }
}
