//! Agenda HTTP surface
//!
//! Axum server that receives the messaging transport's webhook and answers
//! with TwiML. Each endpoint has a thin axum handler that delegates to a pure
//! inner function, so the logic is testable without axum dispatch.
//!
//! Endpoints:
//! - POST {webhook_path} — one conversation turn (form fields `From`, `Body`)
//! - GET  /health        — backend status
//! - GET  /version       — server version info

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::assistant::Assistant;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub assistant: Assistant,
    /// Set when the appointment backend is Postgres, for `/health`.
    pub pool: Option<PgPool>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(webhook_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .with_state(state)
}

/// Start the HTTP server on `host:port`.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    host: &str,
    port: u16,
    webhook_path: &str,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let app = build_router(state, webhook_path);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Agenda webhook listening on http://{}{}", addr, webhook_path);

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

/// Form body posted by the messaging transport.
#[derive(Debug, Deserialize, Default)]
pub struct WebhookForm {
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner webhook — runs one turn and wraps the reply in TwiML.
pub async fn webhook_inner(assistant: &Assistant, form: WebhookForm) -> String {
    let from = form.from.unwrap_or_default();
    let body = form.body.unwrap_or_default();
    let reply = assistant.handle_message(&from, &body).await;
    twiml_message(&reply)
}

/// Inner health check — returns (status_code, json_body).
pub async fn health_inner(
    assistant: &Assistant,
    pool: Option<&PgPool>,
) -> (StatusCode, serde_json::Value) {
    let backend = assistant.gateway().name();

    let Some(pool) = pool else {
        return (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "backend": backend,
            }),
        );
    };

    match agenda_core::db::health_check(pool).await {
        Ok(pg_ver) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "backend": backend,
                "postgresql": pg_ver,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "backend": backend,
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "agenda/1",
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn webhook_handler(
    State(state): State<Arc<HttpState>>,
    Form(form): Form<WebhookForm>,
) -> impl IntoResponse {
    let xml = webhook_inner(&state.assistant, form).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        xml,
    )
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.assistant, state.pool.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Helpers
// ============================================================================

/// `<Response><Message>…</Message></Response>` with the text XML-escaped.
pub fn twiml_message(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        quick_xml::escape::escape(text)
    )
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_core::config::StudioConfig;
    use agenda_core::{MemoryGateway, MemorySessionStore, Rules};

    fn make_assistant() -> Assistant {
        Assistant::new(
            Rules::default(),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryGateway::new()),
            &StudioConfig::default(),
        )
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "agenda/1");
    }

    #[test]
    fn test_twiml_escapes_markup() {
        let xml = twiml_message("Corte & Escova <b>");
        assert!(xml.contains("<Response><Message>Corte &amp; Escova &lt;b&gt;</Message></Response>"));
    }

    #[tokio::test]
    async fn test_health_inner_without_database() {
        let assistant = make_assistant();
        let (status, body) = health_inner(&assistant, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memory");
    }

    #[tokio::test]
    async fn test_webhook_inner_missing_fields() {
        let assistant = make_assistant();
        let xml = webhook_inner(&assistant, WebhookForm::default()).await;
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("Opção inválida"));
    }

    #[tokio::test]
    async fn test_webhook_inner_greeting_returns_menu() {
        let assistant = make_assistant();
        let form = WebhookForm {
            from: Some("whatsapp:+5511988887777".to_string()),
            body: Some("Bom dia!".to_string()),
        };
        let xml = webhook_inner(&assistant, form).await;
        assert!(xml.contains("Escolha uma opção"));
    }
}
