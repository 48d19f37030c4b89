//! pgtalk HTTP API and web UI
//!
//! Axum-based server. Each endpoint has a thin axum handler that delegates
//! to an inner function returning `(StatusCode, serde_json::Value)`, so the
//! logic is testable without going through the router.
//!
//! Endpoints:
//! - GET    /              — web UI
//! - GET    /health        — health check with DB status
//! - GET    /version       — server version info
//! - POST   /ask           — question → SQL → rows → explanation
//! - GET    /training      — list training entries
//! - POST   /train         — add one training entry
//! - DELETE /training/:id  — remove a training entry

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use pgtalk_core::{query, PgTalkConfig, PgTalkError, SqlAssistant, TrainingKind};
use serde::Deserialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ui;

pub const NO_SQL_MESSAGE: &str = "Failed to generate SQL from your question. Please try rephrasing.";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: PgPool,
    pub assistant: SqlAssistant,
    pub config: PgTalkConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/ask", post(ask_handler))
        .route("/training", get(list_training_handler))
        .route("/train", post(train_handler))
        .route("/training/:id", delete(remove_training_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("pgtalk listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub kind: TrainingKind,
    pub content: String,
    pub question: Option<String>,
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "error": msg.into(),
        "status": "error",
    })
}

/// Map a core error onto an HTTP status.
pub fn status_for(error: &PgTalkError) -> StatusCode {
    match error {
        PgTalkError::Embedding(_) | PgTalkError::Llm(_) => StatusCode::BAD_GATEWAY,
        PgTalkError::NoSqlGenerated | PgTalkError::ReadOnly(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub async fn health_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    let pg_ver = match pgtalk_core::db::health_check(pool).await {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                }),
            );
        }
    };

    let pgvector_ver = match pgtalk_core::db::check_pgvector(pool).await {
        Ok(v) => v,
        Err(e) => format!("unavailable: {}", e),
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "postgresql": pg_ver,
            "pgvector": pgvector_ver,
        }),
    )
}

pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "pgtalk/1",
    })
}

/// Question → SQL → result rows → explanation.
///
/// An explanation failure does not hide results that were already produced;
/// the response then carries `explanation: null` and `explanation_error`.
pub async fn ask_inner(state: &HttpState, req: AskRequest) -> (StatusCode, serde_json::Value) {
    let question = match req.question {
        Some(q) if !q.trim().is_empty() => q.trim().to_string(),
        _ => return (StatusCode::BAD_REQUEST, error_body("question field is required")),
    };

    let start = Instant::now();
    tracing::info!(question = %question, "Answering question");

    let sql = match state.assistant.generate_sql(&question).await {
        Ok(Some(sql)) => sql,
        Ok(None) => {
            return (
                status_for(&PgTalkError::NoSqlGenerated),
                error_body(NO_SQL_MESSAGE),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "SQL generation failed");
            return (status_for(&e), error_body(e.to_string()));
        }
    };

    let result = match query::run_sql(&state.pool, &sql, &state.config.query).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, sql = %sql, "Generated SQL failed");
            let mut body = error_body(format!("Error executing query: {}", e));
            body["sql"] = serde_json::json!(sql);
            return (StatusCode::UNPROCESSABLE_ENTITY, body);
        }
    };

    let (explanation, explanation_error) = match state.assistant.generate_explanation(&sql).await {
        Ok(text) => (Some(text), None),
        Err(e) => {
            tracing::warn!(error = %e, "Explanation failed");
            (None, Some(e.to_string()))
        }
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "question": question,
            "sql": sql,
            "columns": result.columns,
            "row_count": result.rows.len(),
            "rows": result.rows,
            "truncated": result.truncated,
            "explanation": explanation,
            "explanation_error": explanation_error,
            "took_ms": start.elapsed().as_millis() as u64,
        }),
    )
}

pub async fn list_training_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    match state.assistant.store().list().await {
        Ok(entries) => (
            StatusCode::OK,
            serde_json::json!({
                "count": entries.len(),
                "entries": entries,
            }),
        ),
        Err(e) => (status_for(&e), error_body(e.to_string())),
    }
}

pub async fn train_inner(state: &HttpState, req: TrainRequest) -> (StatusCode, serde_json::Value) {
    let content = req.content.trim();
    if content.is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("content field is required"));
    }

    let assistant = &state.assistant;
    let result = match req.kind {
        TrainingKind::Ddl => assistant.train_ddl(content).await,
        TrainingKind::Documentation => assistant.train_documentation(content).await,
        TrainingKind::Sql => {
            let question = match req.question.filter(|q| !q.trim().is_empty()) {
                Some(q) => Ok(q),
                None => assistant.generate_question(content).await,
            };
            match question {
                Ok(q) => assistant.train_sql(&q, content).await,
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(id) => (
            StatusCode::OK,
            serde_json::json!({ "id": id, "kind": req.kind }),
        ),
        Err(e) => (status_for(&e), error_body(e.to_string())),
    }
}

pub async fn remove_training_inner(state: &HttpState, id: Uuid) -> (StatusCode, serde_json::Value) {
    match state.assistant.store().remove(id).await {
        Ok(true) => (StatusCode::OK, serde_json::json!({ "removed": true, "id": id })),
        Ok(false) => (StatusCode::NOT_FOUND, error_body(format!("no training entry {id}"))),
        Err(e) => (status_for(&e), error_body(e.to_string())),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegating to the inner functions)
// ============================================================================

pub async fn index_handler() -> Html<&'static str> {
    Html(ui::INDEX_HTML)
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn ask_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AskRequest>,
) -> impl IntoResponse {
    let (status, body) = ask_inner(&state, req).await;
    (status, Json(body))
}

pub async fn list_training_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_training_inner(&state).await;
    (status, Json(body))
}

pub async fn train_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<TrainRequest>,
) -> impl IntoResponse {
    let (status, body) = train_inner(&state, req).await;
    (status, Json(body))
}

pub async fn remove_training_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = remove_training_inner(&state, id).await;
    (status, Json(body))
}
