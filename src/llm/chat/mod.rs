pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{ de::DeserializeOwned, Serialize };
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::ChatMessage;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub response: String,
}

/// Everything that can go wrong between sending the transcript and reading a reply.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid provider configuration: {0}")]
    Config(String),
    #[error("Provider request failed: {0}")]
    Transport(reqwest::Error),
    #[error("Provider request timed out")]
    Timeout,
    #[error("Provider returned HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("Provider returned no candidates")]
    EmptyResponse,
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() { ProviderError::Timeout } else { ProviderError::Transport(e) }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends the whole ordered transcript and returns the first candidate's text.
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, ProviderError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ProviderError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

pub(crate) fn http_client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    HttpClient::builder().timeout(timeout).connect_timeout(CONNECT_TIMEOUT)
}

pub(crate) fn join_url(base_url: &str, route: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(route) {
        base.to_string()
    } else {
        format!("{}{}", base, route)
    }
}

/// POSTs `payload` and decodes a JSON body, turning non-2xx answers into `ProviderError::Status`.
pub(crate) async fn post_json<P, R>(
    http: &HttpClient,
    url: &str,
    payload: &P
) -> Result<R, ProviderError>
    where P: Serialize + ?Sized + Sync, R: DeserializeOwned
{
    let resp = http.post(url).json(payload).send().await?;
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    serde_json::from_str::<R>(&body).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{ routing::post, Json, Router, http::StatusCode };
    use serde::Deserialize;
    use serde_json::{ json, Value };
    use test_support::spawn_stub;

    #[derive(Deserialize, Debug)]
    struct Echo {
        ok: bool,
    }

    #[test]
    fn join_url_appends_route_once() {
        assert_eq!(join_url("http://h:1/", "/api/chat"), "http://h:1/api/chat");
        assert_eq!(join_url("http://h:1/api/chat", "/api/chat"), "http://h:1/api/chat");
    }

    #[tokio::test]
    async fn post_json_decodes_success_body() {
        let app = Router::new().route("/x", post(|| async { Json(json!({ "ok": true })) }));
        let base = spawn_stub(app).await;
        let http = http_client_builder(Duration::from_secs(5)).build().unwrap();
        let echo: Echo = post_json(&http, &format!("{}/x", base), &json!({})).await.unwrap();
        assert!(echo.ok);
    }

    #[tokio::test]
    async fn post_json_reports_status_and_body() {
        let app = Router::new().route(
            "/x",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") })
        );
        let base = spawn_stub(app).await;
        let http = http_client_builder(Duration::from_secs(5)).build().unwrap();
        let err = post_json::<Value, Echo>(&http, &format!("{}/x", base), &json!({})).await.unwrap_err();
        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn post_json_flags_malformed_body() {
        let app = Router::new().route("/x", post(|| async { "not json" }));
        let base = spawn_stub(app).await;
        let http = http_client_builder(Duration::from_secs(5)).build().unwrap();
        let err = post_json::<Value, Echo>(&http, &format!("{}/x", base), &json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn slow_provider_maps_to_timeout() {
        let app = Router::new().route(
            "/x",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({ "ok": true }))
            })
        );
        let base = spawn_stub(app).await;
        let http = http_client_builder(Duration::from_millis(100)).build().unwrap();
        let err = post_json::<Value, Echo>(&http, &format!("{}/x", base), &json!({})).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_error() {
        let http = http_client_builder(Duration::from_secs(2)).build().unwrap();
        let err = post_json::<Value, Echo>(&http, "http://127.0.0.1:1/x", &json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }
}
