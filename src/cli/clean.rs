//! `talkcsv clean` command implementation.

use crate::config::{load_config, parse_duration};
use crate::error::Result;
use crate::storage::{ChatStore, FileBackend};
use chrono::{Duration, Utc};

/// Run the clean command.
///
/// Removes saved chats not updated within the given duration.
///
/// # Errors
///
/// Returns an error if the duration is invalid or the storage backend fails.
pub fn run(before: &str, all: bool) -> Result<()> {
    let store = FileBackend::new(load_config()?.storage.path)?;

    let duration = if all {
        Duration::zero()
    } else {
        parse_duration(before)?
    };

    let removed = clean_chats(&store, duration)?;

    if removed == 0 {
        println!("No chats to clean.");
    } else {
        println!("Cleaned {removed} chat(s).");
    }

    Ok(())
}

/// Delete chats last updated before `now - before`.
fn clean_chats(store: &dyn ChatStore, before: Duration) -> Result<usize> {
    let cutoff = Utc::now() - before;
    let mut removed = 0;

    for summary in store.list_chats(usize::MAX)? {
        if summary.updated_at > cutoff {
            continue;
        }
        store.delete_chat(&summary.chat_id)?;
        removed += 1;
    }

    Ok(removed)
}
