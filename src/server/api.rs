use crate::agent::ChatAgent;
use crate::models::chat::ChatMessage;
use super::error::ApiError;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ State, rejection::JsonRejection },
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn };

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Serialize)]
struct HistoryResponse {
    conversation_id: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<ChatAgent>,
}

pub fn router(agent: Arc<ChatAgent>) -> Router {
    // Any origin, method and header: the bundled web page is served from elsewhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/history", get(history_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(AppState { agent })
}

pub async fn start_http_server(
    addr: &str,
    agent: Arc<ChatAgent>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()
        .map_err(|e| format!("Invalid server address '{}': {}", addr, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await
        .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e))?;
    info!("HTTP server listening on: http://{}", addr);

    axum::serve(listener, router(agent).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!("Rejected chat request: {}", rejection.body_text());
        ApiError::from(rejection)
    })?;

    let reply = state.agent.handle(&req.message).await?;
    Ok(Json(ChatResponse { reply }))
}

async fn history_handler(State(state): State<AppState>) -> Result<Json<HistoryResponse>, ApiError> {
    let conversation = state.agent.transcript().await?;
    Ok(Json(HistoryResponse {
        conversation_id: conversation.id,
        messages: conversation.messages,
    }))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
