use crate::cli::Args;
use crate::history::{ initialize_history_store, HistoryError, HistoryStore, DEFAULT_CONVERSATION_ID };
use crate::llm::LlmConfig;
use crate::llm::chat::{ new_client as new_chat_client, ChatClient, ProviderError };
use crate::models::chat::{ Conversation, Role };

use log::{ info, warn, error };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::runtime::Handle;
use tokio::sync::{ Mutex, OwnedMutexGuard };

#[derive(Debug, ThisError)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<HistoryError> for AgentError {
    fn from(e: HistoryError) -> Self {
        AgentError::Internal(e.to_string())
    }
}

/// Mediates one chat turn at a time against a shared transcript.
///
/// Every call appends the user turn, replays the whole transcript to the
/// provider and appends the reply. Calls are serialized end-to-end by
/// `turn_lock`, so a reply always continues the caller's own user turn. When
/// the call fails or is abandoned the user turn is rolled back and the
/// transcript is left exactly as it was before the call.
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    history_store: Arc<dyn HistoryStore>,
    provider_timeout: Duration,
    turn_lock: Arc<Mutex<()>>,
}

impl ChatAgent {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        history_store: Arc<dyn HistoryStore>,
        provider_timeout: Duration
    ) -> Self {
        Self {
            chat_client,
            history_store,
            provider_timeout,
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let llm_type = args.chat_llm_type
            .parse()
            .map_err(|e| format!("Invalid chat LLM type: {}", e))?;
        let api_key = if args.has_api_key() { Some(args.chat_api_key.clone()) } else { None };
        let timeout = Duration::from_secs(args.provider_timeout_secs.max(1));
        let chat_config = LlmConfig {
            llm_type,
            api_key,
            completion_model: args.chat_model.clone(),
            base_url: args.chat_base_url.clone(),
            timeout,
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_config.llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let history_store = initialize_history_store(args)?;
        Ok(Self::new(chat_client, history_store, timeout))
    }

    pub async fn handle(&self, message: &str) -> Result<String, AgentError> {
        self.handle_in(DEFAULT_CONVERSATION_ID, message).await
    }

    pub async fn handle_in(&self, conversation_id: &str, message: &str) -> Result<String, AgentError> {
        let turn = Arc::clone(&self.turn_lock).lock_owned().await;

        let before = self.history_store.len(conversation_id).await?;
        let rollback = TurnRollback {
            history_store: Arc::clone(&self.history_store),
            conversation_id: conversation_id.to_string(),
            before,
            turn: Some(turn),
        };

        match self.run_turn(conversation_id, message, before).await {
            Ok(reply) => {
                rollback.commit();
                Ok(reply)
            }
            Err(e) => {
                error!("Chat turn failed for '{}': {}", conversation_id, e);
                rollback.rollback().await;
                Err(e)
            }
        }
    }

    async fn run_turn(
        &self,
        conversation_id: &str,
        message: &str,
        before: usize
    ) -> Result<String, AgentError> {
        let after_user = self.history_store.add_message(conversation_id, Role::User, message).await?;
        if after_user != before + 1 {
            return Err(
                AgentError::Internal(
                    format!("transcript length jumped from {} to {} on append", before, after_user)
                )
            );
        }

        let reply = self.execute_llm_interaction(conversation_id).await?;
        let total = self.history_store.add_message(conversation_id, Role::Assistant, &reply).await?;
        info!("Turn completed for '{}', transcript now holds {} messages", conversation_id, total);
        Ok(reply)
    }

    async fn execute_llm_interaction(&self, conversation_id: &str) -> Result<String, AgentError> {
        let conversation = self.history_store.get_conversation(conversation_id).await?;
        info!(
            "Sending {} messages to {} for '{}'",
            conversation.messages.len(),
            self.chat_client.get_model(),
            conversation_id
        );

        let resp = tokio::time
            ::timeout(self.provider_timeout, self.chat_client.complete(&conversation.messages)).await
            .map_err(|_| ProviderError::Timeout)??;
        Ok(resp.response)
    }

    pub async fn transcript(&self) -> Result<Conversation, AgentError> {
        Ok(self.history_store.get_conversation(DEFAULT_CONVERSATION_ID).await?)
    }
}

/// Restores the transcript to `before` unless the turn is committed.
///
/// Owns the turn lock, so the next caller cannot start until the transcript is
/// back in shape. If the turn future is dropped mid-flight (client went away),
/// the truncate runs on a spawned task that still holds the lock.
struct TurnRollback {
    history_store: Arc<dyn HistoryStore>,
    conversation_id: String,
    before: usize,
    turn: Option<OwnedMutexGuard<()>>,
}

impl TurnRollback {
    fn commit(mut self) {
        self.turn.take();
    }

    async fn rollback(mut self) {
        // Lock stays held across the await; if this is cancelled, Drop finishes the job.
        restore(&*self.history_store, &self.conversation_id, self.before).await;
        self.turn.take();
    }
}

impl Drop for TurnRollback {
    fn drop(&mut self) {
        let Some(turn) = self.turn.take() else {
            return;
        };
        warn!("Chat turn for '{}' abandoned before completion", self.conversation_id);
        let history_store = Arc::clone(&self.history_store);
        let conversation_id = self.conversation_id.clone();
        let before = self.before;
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    restore(&*history_store, &conversation_id, before).await;
                    drop(turn);
                });
            }
            Err(_) => {
                error!(
                    "No runtime to roll back '{}'; transcript may hold a dangling user turn",
                    conversation_id
                );
            }
        }
    }
}

async fn restore(history_store: &dyn HistoryStore, conversation_id: &str, before: usize) {
    match history_store.truncate(conversation_id, before).await {
        Ok(()) => warn!("Rolled back user turn for '{}' to {} messages", conversation_id, before),
        Err(e) => error!("Failed to roll back '{}' to {} messages: {}", conversation_id, before, e),
    }
}
