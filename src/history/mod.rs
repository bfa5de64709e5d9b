mod memory;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use thiserror::Error;
use crate::cli::Args;
use crate::models::chat::{ Conversation, Role };

pub use memory::InMemoryHistoryStore;

/// Key of the single process-wide conversation served over HTTP.
pub const DEFAULT_CONVERSATION_ID: &str = "default";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Unsupported history store type: {0}")]
    Unsupported(String),
    #[error("History corrupted: {0}")]
    Corrupted(String),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends a turn and returns the conversation length after the append.
    async fn add_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Result<usize, HistoryError>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, HistoryError>;

    /// Drops every turn at index `len` and beyond. No-op when already shorter.
    async fn truncate(&self, conversation_id: &str, len: usize) -> Result<(), HistoryError>;

    async fn len(&self, conversation_id: &str) -> Result<usize, HistoryError>;
}

pub fn create_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    match args.history_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryHistoryStore::new())),
        _ => Err(HistoryError::Unsupported(args.history_type.clone())),
    }
}

pub fn initialize_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    info!("Chat history will be stored in: {}", args.history_type);
    create_history_store(args)
}
