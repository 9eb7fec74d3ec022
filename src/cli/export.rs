//! `talkcsv export` command implementation.

use crate::config::load_config;
use crate::core::chat::render;
use crate::error::{Error, Result};
use crate::storage::{ChatStore, FileBackend};
use std::fs;
use std::path::Path;

/// Run the export command.
///
/// Writes the saved chat's current session, or archived session `session`,
/// as `role: content` lines to `output` or stdout.
///
/// # Errors
///
/// Returns an error if the chat or session does not exist or the output
/// cannot be written.
pub fn run(chat_id: &str, session: Option<usize>, output: Option<&Path>) -> Result<()> {
    let store = FileBackend::new(load_config()?.storage.path)?;
    let text = export_text(&store, chat_id, session)?;

    match output {
        Some(path) => {
            fs::write(path, &text)?;
            println!("Chat history saved to {}", path.display());
        }
        None => println!("{text}"),
    }

    Ok(())
}

fn export_text(store: &dyn ChatStore, chat_id: &str, session: Option<usize>) -> Result<String> {
    let saved = store
        .get_chat(chat_id)?
        .ok_or_else(|| Error::ChatNotFound(chat_id.to_string()))?;

    let mut chat = saved.chat;
    if let Some(index) = session {
        chat.select_archived(index)?;
    }
    Ok(render(chat.messages()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SavedChat;
    use crate::storage::MemoryBackend;

    fn store_with_chat() -> MemoryBackend {
        let store = MemoryBackend::new();
        let mut saved = SavedChat::with_id("c1");
        saved.chat.submit_user("old question");
        saved.chat.new_session();
        saved.chat.submit_user("new question");
        store.put_chat(&saved).unwrap();
        store
    }

    #[test]
    fn exports_current_session() {
        let text = export_text(&store_with_chat(), "c1", None).unwrap();
        assert_eq!(text, "assistant: How can I help you?\nuser: new question");
    }

    #[test]
    fn exports_archived_session() {
        let text = export_text(&store_with_chat(), "c1", Some(1)).unwrap();
        assert_eq!(text, "assistant: How can I help you?\nuser: old question");
    }

    #[test]
    fn missing_session_is_index_error() {
        let err = export_text(&store_with_chat(), "c1", Some(2)).unwrap_err();
        assert!(matches!(err, Error::Index { index: 2, len: 1 }));
    }

    #[test]
    fn missing_chat() {
        let err = export_text(&store_with_chat(), "nope", None).unwrap_err();
        assert!(matches!(err, Error::ChatNotFound(_)));
    }
}
