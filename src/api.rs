//! REST API Server for the Financial Agent Coordinator
//!
//! Exposes query answering, status and capability listing over HTTP

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::agent::FinancialAgent;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryRequest {
    pub query: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<FinancialAgent>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Status & Capabilities
/// =============================

async fn status(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(state.agent.status()))
}

async fn capabilities(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(state.agent.registry().info()))
}

/// =============================
/// Query Endpoint
/// =============================

async fn run_query(
    State(state): State<ApiState>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Query must not be empty".into())),
        );
    }

    info!(query = %req.query, "Received query request");

    let outcome = state.agent.query(&req.query).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "query_id": outcome.query_id,
            "answer": outcome.answer.text,
            "mode": outcome.answer.mode,
            "sources": outcome.answer.contributing_capability_ids,
            "masked_fields": outcome.answer.masked_fields,
            "routing": outcome.decision.source,
            "selected": outcome.decision.selected,
            "results": outcome.results,
            "reasoning_trace": outcome.reasoning_trace,
            "execution_time_ms": outcome.execution_time_ms,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<FinancialAgent>) -> Router {
    let state = ApiState { agent };

    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/capabilities", get(capabilities))
        .route("/api/query", post(run_query))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<FinancialAgent>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::ScriptedReasoner;
    use crate::test_support::demo_setup;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(responses: &[&str]) -> Router {
        let reasoner = Arc::new(ScriptedReasoner::new(responses.iter().copied()));
        let setup = demo_setup(reasoner.clone());
        create_router(Arc::new(FinancialAgent::new(
            setup.registry.clone(),
            setup.classifier.clone(),
            reasoner,
        )))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(&[])
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_capabilities_listing() {
        let response = app(&[])
            .oneshot(Request::get("/api/capabilities").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 6);
        assert_eq!(data[3]["id"], "portfolio_database");
        assert_eq!(data[5]["kind"], "transform");
    }

    #[tokio::test]
    async fn test_query_endpoint() {
        let response = app(&["googl_filings"])
            .oneshot(
                Request::post("/api/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "What drives Google revenue?"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["routing"], "reasoned");
        assert_eq!(body["data"]["mode"], "pass_through");
        assert!(body["data"]["answer"].as_str().unwrap().contains("Alphabet Inc. (GOOGL)"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let response = app(&[])
            .oneshot(
                Request::post("/api/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
