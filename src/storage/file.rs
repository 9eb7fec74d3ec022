//! File-based storage backend.

use crate::core::SavedChat;
use crate::error::Result;
use crate::storage::traits::{ChatStore, ChatSummary};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::warn;

/// File-based storage backend with atomic writes.
///
/// Chats live at `<base_dir>/chats/<id>.json`.
#[derive(Debug)]
pub struct FileBackend {
    base_dir: PathBuf,
}

impl FileBackend {
    /// Create a new file backend.
    ///
    /// Creates the chats directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the chats directory cannot be created.
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(base_dir.join("chats"))?;
        Ok(Self { base_dir })
    }

    /// Base directory of this backend.
    #[must_use]
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to a chat file, or `None` if the id is not a plain name.
    fn chat_path(&self, chat_id: &str) -> Option<PathBuf> {
        let plain = !chat_id.is_empty()
            && chat_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        plain.then(|| self.base_dir.join("chats").join(format!("{chat_id}.json")))
    }
}

impl ChatStore for FileBackend {
    fn get_chat(&self, chat_id: &str) -> Result<Option<SavedChat>> {
        let Some(path) = self.chat_path(chat_id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let chat: SavedChat = serde_json::from_str(&contents)?;
        Ok(Some(chat))
    }

    fn put_chat(&self, chat: &SavedChat) -> Result<()> {
        let path = self.chat_path(&chat.id).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid chat id: {}", chat.id),
            )
        })?;
        let temp = path.with_extension("tmp");

        let contents = serde_json::to_string_pretty(chat)?;
        fs::write(&temp, &contents)?;

        // Rename is atomic, so readers never see a half-written chat
        fs::rename(&temp, &path)?;

        Ok(())
    }

    fn list_chats(&self, limit: usize) -> Result<Vec<ChatSummary>> {
        let chats_dir = self.base_dir.join("chats");
        let mut chats = Vec::new();

        if !chats_dir.exists() {
            return Ok(chats);
        }

        for entry in fs::read_dir(&chats_dir)? {
            let path = entry?.path();

            // Only process .json files (skip .tmp files)
            if path.extension().is_some_and(|e| e == "json") {
                let parsed = fs::read_to_string(&path)
                    .ok()
                    .and_then(|contents| serde_json::from_str::<SavedChat>(&contents).ok());
                match parsed {
                    Some(chat) => chats.push(ChatSummary::from(&chat)),
                    None => warn!(path = %path.display(), "skipping unreadable chat file"),
                }
            }
        }

        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        chats.truncate(limit);
        Ok(chats)
    }

    fn delete_chat(&self, chat_id: &str) -> Result<()> {
        if let Some(path) = self.chat_path(chat_id) {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
