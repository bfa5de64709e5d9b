//! Maps mediation failures onto HTTP responses.
//!
//! Handlers return `Result<T, ApiError>`; every variant becomes a JSON body
//! of the form `{"error": "..."}`. Internal failures are logged in full and
//! only a generic message reaches the caller.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::agent::AgentError;
use crate::llm::chat::ProviderError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body was not `{"message": "<string>"}`.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    Provider(ProviderError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Provider(p) => ApiError::Provider(p),
            AgentError::Internal(m) => ApiError::Internal(m),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Provider(e) if e.is_timeout() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let client_message = match &self {
            ApiError::Validation(m) => m.clone(),
            ApiError::Provider(e) => format!("completion provider failure: {}", e),
            ApiError::Internal(m) => {
                error!("Internal server error: {}", m);
                "internal server error".to_owned()
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}
