//! HTTP transport implementation
//!
//! REST surface over the same tool handler the stdio transport uses:
//! `POST /tools/{tool_name}` invokes a tool, `GET /tools/list` enumerates
//! them, `GET /health` reports liveness.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use super::{McpMessage, MessageHandler, ToolsCallParams};

/// HTTP transport for web applications and remote access
#[derive(Clone)]
pub struct HttpTransport {
    host: String,
    port: u16,
}

/// HTTP request body for a tool call
#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub arguments: Option<Value>,
}

/// HTTP response for tool operations
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Application state for HTTP handlers
#[derive(Clone)]
struct AppState {
    handler: Arc<dyn MessageHandler + Send + Sync>,
    next_request_id: Arc<AtomicU64>,
}

impl AppState {
    fn next_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl HttpTransport {
    /// Create a new HTTP transport instance
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    fn create_router(&self, handler: Arc<dyn MessageHandler + Send + Sync>) -> Router {
        let state = AppState {
            handler,
            next_request_id: Arc::new(AtomicU64::new(1)),
        };

        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(Any);

        Router::new()
            .route("/tools/{tool_name}", post(handle_tool_call))
            .route("/tools/list", get(handle_tools_list))
            .route("/health", get(handle_health_check))
            .layer(cors)
            .with_state(state)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new("0.0.0.0".to_string(), 3000)
    }
}

#[async_trait]
impl super::Transport for HttpTransport {
    async fn start(&self, handler: Box<dyn MessageHandler + Send + Sync>) -> Result<()> {
        let handler = Arc::from(handler);
        info!("Starting HTTP transport on {}:{}", self.host, self.port);

        let app = self.create_router(handler);
        let addr = format!("{}:{}", self.host, self.port);

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;

        info!("HTTP server listening on http://{}", addr);

        axum::serve(listener, app).await.context("HTTP server error")?;

        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down HTTP transport");
        Ok(())
    }
}

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(tool_name): Path<String>,
    Json(request): Json<ToolRequest>,
) -> impl IntoResponse {
    let message = McpMessage::ToolsCall {
        id: state.next_id(),
        params: ToolsCallParams {
            name: tool_name.clone(),
            arguments: request.arguments,
        },
    };

    match state.handler.handle_message(message).await {
        Ok(Some(McpMessage::Response { result, error: None, .. })) => (
            StatusCode::OK,
            Json(ToolResponse {
                success: true,
                result,
                error: None,
            }),
        ),
        Ok(Some(McpMessage::Response { error: Some(rpc_error), .. })) => (
            StatusCode::BAD_REQUEST,
            Json(ToolResponse {
                success: false,
                result: None,
                error: Some(rpc_error.message),
            }),
        ),
        Ok(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ToolResponse {
                success: false,
                result: None,
                error: Some("No response from handler".to_string()),
            }),
        ),
        Err(e) => {
            warn!("Tool call {} failed: {}", tool_name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ToolResponse {
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn handle_tools_list(State(state): State<AppState>) -> impl IntoResponse {
    let message = McpMessage::ToolsList { id: state.next_id() };

    match state.handler.handle_message(message).await {
        Ok(Some(McpMessage::Response { result: Some(result), .. })) => {
            (StatusCode::OK, Json(result))
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to list tools" })),
        ),
    }
}

async fn handle_health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        timestamp: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new("127.0.0.1".to_string(), 8080);
        assert_eq!(transport.port, 8080);
        assert_eq!(transport.host, "127.0.0.1");
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
        };

        let json_str = serde_json::to_string(&response).unwrap();
        assert!(json_str.contains("healthy"));
        assert!(json_str.contains(crate::VERSION));
    }
}
