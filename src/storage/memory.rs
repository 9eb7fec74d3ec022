//! In-memory storage backend for testing.

use crate::core::SavedChat;
use crate::error::Result;
use crate::storage::traits::{ChatStore, ChatSummary};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage backend for testing.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    chats: RwLock<HashMap<String, SavedChat>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStore for MemoryBackend {
    fn get_chat(&self, chat_id: &str) -> Result<Option<SavedChat>> {
        let chats = self.chats.read().unwrap();
        Ok(chats.get(chat_id).cloned())
    }

    fn put_chat(&self, chat: &SavedChat) -> Result<()> {
        let mut chats = self.chats.write().unwrap();
        chats.insert(chat.id.clone(), chat.clone());
        Ok(())
    }

    fn list_chats(&self, limit: usize) -> Result<Vec<ChatSummary>> {
        let chats = self.chats.read().unwrap();
        let mut summaries: Vec<ChatSummary> = chats.values().map(ChatSummary::from).collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    fn delete_chat(&self, chat_id: &str) -> Result<()> {
        let mut chats = self.chats.write().unwrap();
        chats.remove(chat_id);
        Ok(())
    }
}
