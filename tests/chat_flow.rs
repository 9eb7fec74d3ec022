//! Integration tests for the full chat flow.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use talkcsv::agent::{ChatMessage, ChatModel, SqlAgent};
use talkcsv::config::{AgentConfig, Encoding};
use talkcsv::core::{ChatSessionStore, Message, Role, SavedChat};
use talkcsv::data::convert::convert;
use talkcsv::data::{DataSourceResolver, Provenance, TableUpload};
use talkcsv::storage::{ChatStore, FileBackend};
use talkcsv::{ChatApp, Error, Result};
use tempfile::TempDir;

/// Model that replays canned turns.
struct Scripted(RefCell<VecDeque<String>>);

impl Scripted {
    fn new(turns: &[&str]) -> Self {
        Self(RefCell::new(turns.iter().map(ToString::to_string).collect()))
    }
}

impl ChatModel for Scripted {
    fn complete(&self, _messages: &[ChatMessage], _stop: &[&str]) -> Result<String> {
        self.0
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::Agent("model unavailable".to_string()))
    }
}

fn write_fixture_db(dir: &TempDir) -> PathBuf {
    let csv = dir.path().join("reports.csv");
    let db = dir.path().join("analytics_db");
    fs::write(
        &csv,
        "region,revenue,reported_on\nnorth,120.5,2024-01-31\nsouth,80,2024-02-29\n",
    )
    .unwrap();
    convert(&csv, &db, "test", Encoding::Latin1).unwrap();
    db
}

fn app_with(db: PathBuf, turns: &[&str]) -> ChatApp {
    let resolver = DataSourceResolver::new(db, "csv_table", Duration::from_secs(7200));
    let agent = SqlAgent::new(Scripted::new(turns), &AgentConfig::default());
    ChatApp::new(ChatSessionStore::new(), resolver).with_answerer(Box::new(agent))
}

#[test]
fn fixed_database_question_is_answered() {
    let temp_dir = TempDir::new().unwrap();
    let db = write_fixture_db(&temp_dir);
    let mut app = app_with(
        db,
        &[
            "Action: sql_db_schema\nAction Input: test",
            "Action: sql_db_query\nAction Input: SELECT region FROM test ORDER BY revenue DESC LIMIT 1",
            "Final Answer: north has the highest revenue.",
        ],
    );

    let handle = app.select_fixed().unwrap();
    assert_eq!(handle.provenance(), Provenance::ReadOnlyFixed);

    let reply = app.ask("Which region earns most?").unwrap();
    assert_eq!(reply, "north has the highest revenue.");
    assert_eq!(
        app.chat().export_current(),
        "assistant: How can I help you?\n\
         user: Which region earns most?\n\
         assistant: north has the highest revenue."
    );
}

#[test]
fn agent_cannot_modify_fixed_database() {
    let temp_dir = TempDir::new().unwrap();
    let db = write_fixture_db(&temp_dir);
    let mut app = app_with(
        db.clone(),
        &[
            "Action: sql_db_query\nAction Input: DELETE FROM test",
            "Final Answer: done",
        ],
    );
    app.select_fixed().unwrap();
    app.ask("delete everything").unwrap();

    let conn = rusqlite::Connection::open(&db).unwrap();
    let count: i64 = conn
        .query_row("SELECT count(*) FROM test", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn agent_failure_keeps_session_consistent() {
    let temp_dir = TempDir::new().unwrap();
    let db = write_fixture_db(&temp_dir);
    let mut app = app_with(db, &[]);
    app.select_fixed().unwrap();

    let err = app.ask("anything").unwrap_err();

    assert!(matches!(err, Error::Agent(_)));
    assert_eq!(
        app.chat().messages(),
        &[Message::greeting(), Message::new(Role::User, "anything")]
    );

    // The app stays usable after a failure
    app.new_chat();
    assert_eq!(app.chat().archive().len(), 1);
}

#[test]
fn missing_fixed_database_keeps_session() {
    let temp_dir = TempDir::new().unwrap();
    let mut app = app_with(temp_dir.path().join("missing"), &[]);
    let upload = TableUpload::new("t.csv", b"a\n1\n".to_vec());
    app.select_upload(upload).unwrap();
    app.new_chat();
    let before = app.chat().clone();

    let err = app.select_fixed().unwrap_err();

    assert!(matches!(err, Error::Connection(_)));
    assert_eq!(app.chat(), &before);
}

#[test]
fn upload_is_queried_in_memory() {
    let mut app = app_with(
        PathBuf::from("unused"),
        &[
            "Action: sql_db_query\nAction Input: SELECT count(*) FROM csv_table WHERE shipped",
            "Final Answer: 2 orders shipped.",
        ],
    );
    let upload = TableUpload::new(
        "orders.csv",
        b"order_id,shipped\n1,true\n2,false\n3,TRUE\n".to_vec(),
    );

    let handle = app.select_upload(upload).unwrap();
    assert_eq!(handle.provenance(), Provenance::EphemeralInMemory);
    assert_eq!(app.ask("how many shipped?").unwrap(), "2 orders shipped.");
}

#[test]
fn chat_survives_save_and_resume() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileBackend::new(temp_dir.path().to_path_buf()).unwrap();
    let mut app = app_with(PathBuf::from("unused"), &["Final Answer: 3"]);
    app.select_upload(TableUpload::new("t.csv", b"a\n1\n2\n3\n".to_vec()))
        .unwrap();
    app.ask("how many rows?").unwrap();
    app.new_chat();

    let mut saved = SavedChat::with_id("resume-me");
    saved.chat = app.into_chat();
    store.put_chat(&saved).unwrap();

    let restored = store.get_chat("resume-me").unwrap().unwrap();
    let mut chat = restored.chat;
    assert_eq!(chat.session_labels(), vec!["Session 1"]);
    chat.select_archived(1).unwrap();
    assert_eq!(
        chat.export_current(),
        "assistant: How can I help you?\nuser: how many rows?\nassistant: 3"
    );
}
