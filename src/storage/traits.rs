//! Storage trait definitions.

use crate::core::SavedChat;
use crate::error::Result;
use chrono::{DateTime, Utc};

/// Storage backend for saved chats.
pub trait ChatStore {
    /// Get a saved chat by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_chat(&self, chat_id: &str) -> Result<Option<SavedChat>>;

    /// Save a chat, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put_chat(&self, chat: &SavedChat) -> Result<()>;

    /// List recently updated chats, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn list_chats(&self, limit: usize) -> Result<Vec<ChatSummary>>;

    /// Delete a chat.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn delete_chat(&self, chat_id: &str) -> Result<()>;
}

/// Summary information for a saved chat.
#[derive(Debug, Clone)]
pub struct ChatSummary {
    /// Chat identifier.
    pub chat_id: String,

    /// Data source last used.
    pub source: Option<String>,

    /// First user question (if any).
    pub first_question: Option<String>,

    /// Number of archived sessions.
    pub archived: usize,

    /// When the chat was created.
    pub created_at: DateTime<Utc>,

    /// When the chat was last saved.
    pub updated_at: DateTime<Utc>,
}

impl From<&SavedChat> for ChatSummary {
    fn from(saved: &SavedChat) -> Self {
        Self {
            chat_id: saved.id.clone(),
            source: saved.source.clone(),
            first_question: saved.first_question().map(ToString::to_string),
            archived: saved.chat.archive().len(),
            created_at: saved.created_at,
            updated_at: saved.updated_at,
        }
    }
}
