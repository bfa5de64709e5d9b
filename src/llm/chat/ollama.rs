use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ http_client_builder, join_url, post_json, ChatClient, CompletionResponse, ProviderError };
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::ChatMessage;

const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<OllamaReply>,
}

#[derive(Deserialize)]
struct OllamaReply {
    content: String,
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        completion_model: Option<String>,
        timeout: Duration
    ) -> Result<Self, ProviderError> {
        let model = completion_model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let http = http_client_builder(timeout)
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: url,
            completion_model: model,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        if config.llm_type != LlmType::Ollama {
            return Err(ProviderError::Config("Invalid config type for OllamaClient".into()));
        }

        Self::new(config.base_url.clone(), config.completion_model.clone(), config.timeout)
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, ProviderError> {
        let url = join_url(&self.base_url, "/api/chat");
        let req = ChatRequest {
            model: &self.completion_model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            stream: false,
        };

        let resp: ChatResponse = post_json(&self.http, &url, &req).await?;
        let reply = resp.message.ok_or(ProviderError::EmptyResponse)?;
        Ok(CompletionResponse { response: reply.content })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
