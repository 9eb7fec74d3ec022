//! `talkcsv list` command implementation.

use crate::config::load_config;
use crate::error::Result;
use crate::storage::{ChatStore, ChatSummary, FileBackend};
use chrono::{DateTime, Local, Utc};

/// Default number of chats to show.
const DEFAULT_LIMIT: usize = 20;

/// Maximum length for question preview.
const QUESTION_PREVIEW_LEN: usize = 50;

/// Run the list command.
///
/// Shows saved chats with their IDs, last update, and first question.
///
/// # Errors
///
/// Returns an error if the storage backend fails.
pub fn run(limit: Option<usize>) -> Result<()> {
    let home = load_config()?.storage.path;
    let store = FileBackend::new(home.clone())?;

    let chats = store.list_chats(limit.unwrap_or(DEFAULT_LIMIT))?;

    if chats.is_empty() {
        println!("No saved chats found.");
        println!("\nChats are stored in: {}", home.join("chats").display());
        return Ok(());
    }

    println!(
        "{:<38} {:<17} {:>8}  First Question",
        "Chat ID", "Updated", "Archived"
    );
    println!("{}", "─".repeat(100));

    for summary in &chats {
        println!("{}", format_row(summary));
    }

    println!("{}", "─".repeat(100));
    println!("Showing {} chat(s)", chats.len());

    Ok(())
}

fn format_row(summary: &ChatSummary) -> String {
    format!(
        "{:<38} {:<17} {:>8}  {}",
        summary.chat_id,
        format_local_time(summary.updated_at),
        summary.archived,
        format_question_preview(summary.first_question.as_deref())
    )
}

/// Format UTC time as local time for display.
fn format_local_time(utc: DateTime<Utc>) -> String {
    let local: DateTime<Local> = utc.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}

/// Format question preview, truncating if needed.
fn format_question_preview(question: Option<&str>) -> String {
    match question {
        Some(q) => {
            let first_line = q.lines().next().unwrap_or(q);
            if first_line.chars().count() > QUESTION_PREVIEW_LEN {
                let cut: String = first_line.chars().take(QUESTION_PREVIEW_LEN).collect();
                format!("{cut}...")
            } else {
                first_line.to_string()
            }
        }
        None => "(no question)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SavedChat;
    use crate::storage::MemoryBackend;

    #[test]
    fn format_question_preview_truncates_long_questions() {
        let long = "x".repeat(100);
        let preview = format_question_preview(Some(&long));
        assert_eq!(preview.chars().count(), QUESTION_PREVIEW_LEN + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn format_question_preview_handles_multibyte() {
        let long = "é".repeat(60);
        let preview = format_question_preview(Some(&long));
        assert!(preview.starts_with("éé"));
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn format_question_preview_handles_none() {
        assert_eq!(format_question_preview(None), "(no question)");
    }

    #[test]
    fn format_question_preview_takes_first_line() {
        let preview = format_question_preview(Some("first line\nsecond line"));
        assert_eq!(preview, "first line");
    }

    #[test]
    fn row_includes_id_and_question() {
        let store = MemoryBackend::new();
        let mut chat = SavedChat::with_id("chat-abc");
        chat.chat.submit_user("which region sells most?");
        chat.chat.new_session();
        store.put_chat(&chat).unwrap();

        let summaries = store.list_chats(10).unwrap();
        let row = format_row(&summaries[0]);
        assert!(row.starts_with("chat-abc"));
        assert!(row.contains("which region sells most?"));
        assert!(row.contains("       1  "));
    }
}
