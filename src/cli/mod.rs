use clap::Parser;
use std::fmt;

#[derive(Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// History chat store type (memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://api.openai.com, http://localhost:11434)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. Required for OpenAI.
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4o-mini, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Upper bound in seconds for a single provider round-trip.
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value = "60")]
    pub provider_timeout_secs: u64,

    // --- General App Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8000")]
    pub server_addr: String,
}

// Hand-written so the credential never reaches a log line through `{:?}`.
impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("history_type", &self.history_type)
            .field("chat_llm_type", &self.chat_llm_type)
            .field("chat_base_url", &self.chat_base_url)
            .field("chat_api_key", &if self.has_api_key() { "<redacted>" } else { "<unset>" })
            .field("chat_model", &self.chat_model)
            .field("provider_timeout_secs", &self.provider_timeout_secs)
            .field("server_addr", &self.server_addr)
            .finish()
    }
}

impl Args {
    pub fn has_api_key(&self) -> bool {
        !self.chat_api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_openai_on_local_port() {
        let args = Args::try_parse_from(["chat-relay"]).unwrap();
        assert_eq!(args.history_type, "memory");
        assert_eq!(args.chat_llm_type, "openai");
        assert_eq!(args.server_addr, "127.0.0.1:8000");
        assert_eq!(args.provider_timeout_secs, 60);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "chat-relay",
            "--chat-llm-type",
            "ollama",
            "--chat-model",
            "llama3",
            "--chat-api-key",
            "secret",
            "--provider-timeout-secs",
            "5",
        ]).unwrap();
        assert_eq!(args.chat_llm_type, "ollama");
        assert_eq!(args.chat_model.as_deref(), Some("llama3"));
        assert!(args.has_api_key());
        assert_eq!(args.provider_timeout_secs, 5);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let args = Args::try_parse_from(["chat-relay", "--chat-api-key", "sk-very-secret"]).unwrap();
        let rendered = format!("{:?}", args);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
