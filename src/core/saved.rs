//! A chat workspace as it is persisted between runs.

use crate::core::chat::{ChatSessionStore, Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted chat: the current session and archive plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedChat {
    /// Chat identifier.
    pub id: String,

    /// Name of the data source last used, for listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Current session and archive.
    pub chat: ChatSessionStore,

    /// When the chat was created.
    pub created_at: DateTime<Utc>,

    /// When the chat was last saved.
    pub updated_at: DateTime<Utc>,
}

impl SavedChat {
    /// Create a chat with a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(&Uuid::new_v4().to_string())
    }

    /// Create a chat with a given id.
    #[must_use]
    pub fn with_id(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            source: None,
            chat: ChatSessionStore::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// First user message across the current session and archive.
    #[must_use]
    pub fn first_question(&self) -> Option<&str> {
        self.chat
            .archive()
            .iter()
            .map(Vec::as_slice)
            .chain(std::iter::once(self.chat.messages()))
            .flatten()
            .find(|m| m.role() == Role::User)
            .map(Message::content)
    }
}

impl Default for SavedChat {
    fn default() -> Self {
        Self::new()
    }
}
