//! Chat session state: the current conversation and its archive.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Greeting that opens every fresh session.
pub const GREETING: &str = "How can I help you?";

/// Default file name for an exported session.
pub const EXPORT_FILE_NAME: &str = "chat_history.txt";

/// Who wrote a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,

    /// The answering agent.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    /// Create a message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// The assistant greeting.
    #[must_use]
    pub fn greeting() -> Self {
        Self::new(Role::Assistant, GREETING)
    }

    /// Message author.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Message text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

/// An ordered conversation.
pub type Session = Vec<Message>;

/// The current session plus an append-only archive of earlier ones.
///
/// The current session always holds at least the greeting, including after
/// loading a saved store whose sessions were emptied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "StoredSessions")]
pub struct ChatSessionStore {
    current: Session,
    archive: Vec<Session>,
}

/// Serialized form of [`ChatSessionStore`], checked on the way in.
#[derive(Deserialize)]
struct StoredSessions {
    current: Session,
    #[serde(default)]
    archive: Vec<Session>,
}

impl From<StoredSessions> for ChatSessionStore {
    fn from(stored: StoredSessions) -> Self {
        let greeted = |session: Session| {
            if session.is_empty() {
                vec![Message::greeting()]
            } else {
                session
            }
        };
        Self {
            current: greeted(stored.current),
            archive: stored.archive.into_iter().map(greeted).collect(),
        }
    }
}

impl Default for ChatSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSessionStore {
    /// Start with a greeting and an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: vec![Message::greeting()],
            archive: Vec::new(),
        }
    }

    /// Messages of the current session, in conversation order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.current
    }

    /// Archived sessions, oldest first.
    #[must_use]
    pub fn archive(&self) -> &[Session] {
        &self.archive
    }

    /// Append a user message to the current session.
    pub fn submit_user(&mut self, text: impl Into<String>) {
        self.current.push(Message::new(Role::User, text));
    }

    /// Append an assistant message to the current session.
    pub fn submit_assistant(&mut self, text: impl Into<String>) {
        self.current.push(Message::new(Role::Assistant, text));
    }

    /// Archive the current session and start a fresh one.
    pub fn new_session(&mut self) {
        let finished = std::mem::replace(&mut self.current, vec![Message::greeting()]);
        self.archive.push(finished);
    }

    /// Reset the current session to the greeting. The archive is untouched.
    pub fn clear_session(&mut self) {
        self.current = vec![Message::greeting()];
    }

    /// Replace the current session with a copy of archived session `index` (1-based).
    ///
    /// The index is checked against the archive as it is now, not as it was
    /// when the label was offered.
    ///
    /// # Errors
    ///
    /// Returns `Error::Index` if `index` is 0 or past the end of the archive.
    /// The current session is left unchanged.
    pub fn select_archived(&mut self, index: usize) -> Result<()> {
        let session = index
            .checked_sub(1)
            .and_then(|i| self.archive.get(i))
            .ok_or(Error::Index {
                index,
                len: self.archive.len(),
            })?;
        self.current = session.clone();
        Ok(())
    }

    /// Render the current session as `role: content` lines.
    ///
    /// Content is written as-is, so a message containing newlines spans
    /// several lines of the export.
    #[must_use]
    pub fn export_current(&self) -> String {
        render(&self.current)
    }

    /// Write the current session export to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn export_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.export_current())?;
        Ok(())
    }

    /// Labels for the history picker: "Session 1", "Session 2", ...
    #[must_use]
    pub fn session_labels(&self) -> Vec<String> {
        (1..=self.archive.len())
            .map(|i| format!("Session {i}"))
            .collect()
    }
}

/// Render a session as newline-joined `role: content` lines.
#[must_use]
pub fn render(session: &[Message]) -> String {
    session
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a history label ("Session 3") or a bare number into a 1-based index.
#[must_use]
pub fn parse_session_label(label: &str) -> Option<usize> {
    let label = label.trim();
    let number = label
        .strip_prefix("Session")
        .map_or(label, str::trim_start);
    number.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loading_empty_sessions_restores_greeting() {
        let json = r#"{"current": [], "archive": [[], [{"role": "user", "content": "hi"}]]}"#;

        let mut store: ChatSessionStore = serde_json::from_str(json).unwrap();

        assert_eq!(store.messages(), &[Message::greeting()]);
        store.select_archived(1).unwrap();
        assert_eq!(store.messages(), &[Message::greeting()]);
        store.select_archived(2).unwrap();
        assert_eq!(store.messages(), &[Message::new(Role::User, "hi")]);
    }

    #[test]
    fn multi_line_content_spans_export_lines() {
        let mut store = ChatSessionStore::new();
        store.submit_assistant("north: 10\nsouth: 20");
        assert_eq!(
            store.export_current(),
            "assistant: How can I help you?\nassistant: north: 10\nsouth: 20"
        );
        assert_eq!(store.export_current().lines().count(), 3);
    }

    #[test]
    fn new_store_has_only_greeting() {
        let store = ChatSessionStore::new();
        assert_eq!(store.messages(), &[Message::greeting()]);
        assert!(store.archive().is_empty());
    }

    #[test]
    fn submit_appends_in_order() {
        let mut store = ChatSessionStore::new();
        store.submit_user("how many rows?");
        store.submit_assistant("42");

        let roles: Vec<Role> = store.messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(store.messages()[1].content(), "how many rows?");
    }

    #[test]
    fn new_session_archives_current() {
        let mut store = ChatSessionStore::new();
        store.submit_user("first");
        let before = store.messages().to_vec();

        store.new_session();

        assert_eq!(store.archive().len(), 1);
        assert_eq!(store.archive()[0], before);
        assert_eq!(store.messages(), &[Message::greeting()]);
    }

    #[test]
    fn new_then_select_recovers_previous_session() {
        let mut store = ChatSessionStore::new();
        store.submit_user("q");
        store.submit_assistant("a");
        let before = store.messages().to_vec();

        store.new_session();
        store.select_archived(1).unwrap();

        assert_eq!(store.messages(), before.as_slice());
        assert_eq!(store.archive().len(), 1);
    }

    #[test]
    fn clear_keeps_archive() {
        let mut store = ChatSessionStore::new();
        store.submit_user("one");
        store.new_session();
        store.submit_user("two");
        store.submit_assistant("three");

        store.clear_session();

        assert_eq!(store.messages(), &[Message::greeting()]);
        assert_eq!(store.archive().len(), 1);
    }

    #[test]
    fn select_out_of_bounds_leaves_current() {
        let mut store = ChatSessionStore::new();
        store.submit_user("keep me");
        let before = store.messages().to_vec();

        let err = store.select_archived(1).unwrap_err();
        assert!(matches!(err, Error::Index { index: 1, len: 0 }));
        assert_eq!(store.messages(), before.as_slice());
    }

    #[test]
    fn select_zero_is_index_error() {
        let mut store = ChatSessionStore::new();
        store.new_session();
        assert!(matches!(
            store.select_archived(0),
            Err(Error::Index { index: 0, len: 1 })
        ));
    }

    #[test]
    fn selected_session_is_a_copy() {
        let mut store = ChatSessionStore::new();
        store.submit_user("original");
        store.new_session();
        store.select_archived(1).unwrap();

        store.submit_user("follow-up");

        assert_eq!(store.archive()[0].len(), 2);
        assert_eq!(store.messages().len(), 3);
    }

    #[test]
    fn export_format() {
        let mut store = ChatSessionStore::new();
        store.submit_user("total sales?");
        store.submit_assistant("1200");

        assert_eq!(
            store.export_current(),
            "assistant: How can I help you?\nuser: total sales?\nassistant: 1200"
        );
    }

    #[test]
    fn export_to_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(EXPORT_FILE_NAME);
        let mut store = ChatSessionStore::new();
        store.submit_user("hi");

        store.export_to(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, store.export_current());
    }

    #[test]
    fn session_labels_follow_archive() {
        let mut store = ChatSessionStore::new();
        assert!(store.session_labels().is_empty());

        store.new_session();
        store.new_session();

        assert_eq!(store.session_labels(), vec!["Session 1", "Session 2"]);
    }

    #[test]
    fn parse_labels() {
        assert_eq!(parse_session_label("Session 3"), Some(3));
        assert_eq!(parse_session_label("2"), Some(2));
        assert_eq!(parse_session_label(" Session 10 "), Some(10));
        assert_eq!(parse_session_label("Select Chat History"), None);
    }

    #[test]
    fn serde_round_trip_preserves_archive() {
        let mut store = ChatSessionStore::new();
        store.submit_user("q");
        store.new_session();

        let json = serde_json::to_string(&store).unwrap();
        assert!(json.contains("\"role\":\"user\""));

        let restored: ChatSessionStore = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, store);
    }
}
