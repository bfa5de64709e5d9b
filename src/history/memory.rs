use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use crate::history::{ HistoryError, HistoryStore };
use crate::models::chat::{ ChatMessage, Conversation, Role };

/// Process-lifetime transcript store. Nothing is evicted and nothing survives a restart.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    conversations: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn add_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Result<usize, HistoryError> {
        let message = ChatMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now().timestamp(),
        };

        let mut conversations = self.conversations.write().await;
        let messages = conversations.entry(conversation_id.to_string()).or_default();
        messages.push(message);
        Ok(messages.len())
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, HistoryError> {
        let conversations = self.conversations.read().await;
        Ok(match conversations.get(conversation_id) {
            Some(messages) => Conversation {
                id: conversation_id.to_string(),
                messages: messages.clone(),
            },
            None => Conversation::empty(conversation_id),
        })
    }

    async fn truncate(&self, conversation_id: &str, len: usize) -> Result<(), HistoryError> {
        let mut conversations = self.conversations.write().await;
        if let Some(messages) = conversations.get_mut(conversation_id) {
            messages.truncate(len);
        }
        Ok(())
    }

    async fn len(&self, conversation_id: &str) -> Result<usize, HistoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(conversation_id).map_or(0, Vec::len))
    }
}
