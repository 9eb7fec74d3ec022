//! `talkcsv chat` command implementation.

use crate::agent::prompt::load_template_from;
use crate::agent::{LlmClient, SqlAgent};
use crate::app::ChatApp;
use crate::cli::editor::{ChatHelper, HISTORY_FILE, run_editor};
use crate::config::{Config, load_config};
use crate::core::chat::{EXPORT_FILE_NAME, parse_session_label, render};
use crate::core::SavedChat;
use crate::data::{DataSourceResolver, Selection, TableUpload};
use crate::error::{Error, Result};
use crate::storage::{ChatStore, FileBackend};
use chrono::Utc;
use rustyline::Editor;
use rustyline::history::DefaultHistory;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HELP: &str = "\
Type a question to ask it. Commands:
  /fixed            chat with the fixed database
  /upload <file>    chat with a CSV file
  /new              archive this chat and start a new one
  /clear            clear this chat
  /history          list archived chats
  /load <n>         show archived chat n (\"Session n\")
  /show             print this chat again
  /share [file]     save this chat as text (default chat_history.txt)
  /help             show this help
  /quit             leave";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A question for the agent.
    Ask(String),
    /// Use the fixed database.
    Fixed,
    /// Use an uploaded file.
    Upload(PathBuf),
    /// Archive and start over.
    New,
    /// Clear the current chat.
    Clear,
    /// List archived chats.
    History,
    /// Switch to an archived chat.
    Load(String),
    /// Reprint the current chat.
    Show,
    /// Export the current chat.
    Share(Option<PathBuf>),
    /// Print help.
    Help,
    /// Leave the loop.
    Quit,
    /// Blank line.
    Empty,
    /// Something starting with `/` that we don't know.
    Unknown(String),
}

/// Parse one line of input.
#[must_use]
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line.to_string());
    };

    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(n, a)| (n, a.trim()));
    let arg = (!arg.is_empty()).then(|| arg.to_string());

    match (name, arg) {
        ("fixed", None) => Command::Fixed,
        ("upload", Some(path)) => Command::Upload(PathBuf::from(path)),
        ("new", None) => Command::New,
        ("clear", None) => Command::Clear,
        ("history", None) => Command::History,
        ("load", Some(label)) => Command::Load(label),
        ("show", None) => Command::Show,
        ("share", path) => Command::Share(path.map(PathBuf::from)),
        ("help", None) => Command::Help,
        ("quit" | "exit", None) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

/// Run the chat command.
///
/// # Errors
///
/// Returns an error if configuration or storage cannot be set up, or the
/// chat to resume does not exist. Errors during the chat are only shown.
pub fn run(upload: Option<&Path>, resume: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let store = FileBackend::new(config.storage.path.clone())?;

    let mut saved = match resume {
        Some(id) => store
            .get_chat(id)?
            .ok_or_else(|| Error::ChatNotFound(id.to_string()))?,
        None => SavedChat::new(),
    };

    let mut app = build_app(&config, &saved)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Welcome to TalkCSV (chat {})", saved.id)?;
    if let Some(notice) = app.startup_notice() {
        writeln!(out, "! {notice}")?;
    }

    let first = match upload {
        Some(path) => Command::Upload(path.to_path_buf()),
        None => Command::Fixed,
    };
    handle_command(&mut app, first, &mut out, config.data.preview_rows)?;
    writeln!(out, "{}", render(app.chat().messages()))?;

    let mut save = |app: &ChatApp| {
        saved.chat = app.chat().clone();
        saved.source = app.selection().map(source_name);
        saved.updated_at = Utc::now();
        if let Err(e) = store.put_chat(&saved) {
            warn!(error = %e, "failed to save chat");
        }
    };

    let preview_rows = config.data.preview_rows;
    if io::stdin().is_terminal() {
        let mut editor: Editor<ChatHelper, DefaultHistory> = Editor::new()?;
        editor.set_helper(Some(ChatHelper));
        let history = config.storage.path.join(HISTORY_FILE);
        if let Err(e) = editor.load_history(&history) {
            debug!(error = %e, "no input history loaded");
        }
        run_editor(&mut app, &mut editor, &mut out, preview_rows, &mut save)?;
        if let Err(e) = editor.save_history(&history) {
            warn!(error = %e, "failed to save input history");
        }
    } else {
        run_loop(&mut app, io::stdin().lock(), &mut out, preview_rows, &mut save)?;
    }

    writeln!(out, "Chat saved. Resume with: talkcsv chat --resume {}", saved.id)?;
    Ok(())
}

/// Build the app: resolver from config, agent if a credential is available.
///
/// # Errors
///
/// Returns an error if the cache TTL in the config is invalid.
pub fn build_app(config: &Config, saved: &SavedChat) -> Result<ChatApp> {
    let resolver = DataSourceResolver::new(
        config.data.fixed_db_path(),
        config.data.upload_table.clone(),
        config.data.cache_ttl()?,
    );
    let app = ChatApp::new(saved.chat.clone(), resolver);

    let client = config
        .agent
        .api_key()
        .and_then(|key| LlmClient::new(&config.agent, key));
    Ok(match client {
        Ok(client) => {
            let agent = SqlAgent::new(client, &config.agent)
                .with_template(load_template_from(&config.storage.path));
            app.with_answerer(Box::new(agent))
        }
        Err(e) => app.without_answerer(e.to_string()),
    })
}

fn source_name(selection: &Selection) -> String {
    match selection {
        Selection::Fixed => "fixed database".to_string(),
        Selection::Upload(upload) => upload.name().to_string(),
    }
}

/// Read commands from non-terminal input until EOF or `/quit`, calling
/// `after` after each one.
///
/// # Errors
///
/// Returns an error only if reading input or writing output fails.
pub fn run_loop<R: BufRead, W: Write>(
    app: &mut ChatApp,
    input: R,
    out: &mut W,
    preview_rows: usize,
    mut after: impl FnMut(&ChatApp),
) -> Result<()> {
    for line in input.lines() {
        if !handle_line(app, &line?, out, preview_rows)? {
            break;
        }
        after(app);
    }
    after(app);
    Ok(())
}

/// Parse and apply one line of input. Returns `false` once the user asks to leave.
///
/// # Errors
///
/// Returns an error only if writing output fails.
pub fn handle_line<W: Write>(
    app: &mut ChatApp,
    line: &str,
    out: &mut W,
    preview_rows: usize,
) -> Result<bool> {
    let command = parse_command(line);
    if command == Command::Quit {
        return Ok(false);
    }
    handle_command(app, command, out, preview_rows)?;
    Ok(true)
}

/// Apply one command, writing what the user should see.
///
/// # Errors
///
/// Returns an error only if writing output fails.
pub fn handle_command<W: Write>(
    app: &mut ChatApp,
    command: Command,
    out: &mut W,
    preview_rows: usize,
) -> Result<()> {
    match command {
        Command::Empty | Command::Quit => {}
        Command::Ask(text) => {
            writeln!(out, "Processing your query...")?;
            match app.ask(&text) {
                Ok(reply) => writeln!(out, "assistant: {reply}")?,
                Err(e) => writeln!(out, "! An error occurred: {e}")?,
            }
        }
        Command::Fixed => match app.select_fixed() {
            Ok(handle) => writeln!(out, "Using database {}", handle.label())?,
            Err(e) => writeln!(out, "! {e}")?,
        },
        Command::Upload(path) => {
            let selected = TableUpload::from_path(&path).and_then(|u| app.select_upload(u));
            match selected {
                Ok(handle) => {
                    writeln!(out, "Here is your uploaded data ({}):", handle.label())?;
                    match app.preview(preview_rows) {
                        Ok(preview) => writeln!(out, "{}", preview.to_table())?,
                        Err(e) => writeln!(out, "! {e}")?,
                    }
                }
                Err(e) => writeln!(out, "! {e}")?,
            }
        }
        Command::New => {
            app.new_chat();
            writeln!(out, "{}", render(app.chat().messages()))?;
        }
        Command::Clear => {
            app.clear_chat();
            writeln!(out, "{}", render(app.chat().messages()))?;
        }
        Command::History => {
            let labels = app.chat().session_labels();
            if labels.is_empty() {
                writeln!(out, "No chat history yet.")?;
            } else {
                writeln!(out, "{}", labels.join("\n"))?;
            }
        }
        Command::Load(label) => match parse_session_label(&label) {
            Some(index) => match app.select_history(index) {
                Ok(()) => writeln!(out, "{}", render(app.chat().messages()))?,
                Err(e) => writeln!(out, "! {e}")?,
            },
            None => writeln!(out, "! Not a chat history: {label}")?,
        },
        Command::Show => writeln!(out, "{}", render(app.chat().messages()))?,
        Command::Share(path) => {
            let path = path.unwrap_or_else(|| PathBuf::from(EXPORT_FILE_NAME));
            match app.export(&path) {
                Ok(()) => writeln!(out, "Chat history saved to {}", path.display())?,
                Err(e) => writeln!(out, "! {e}")?,
            }
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Unknown(line) => writeln!(out, "! Unknown command: {line} (try /help)")?,
    }
    Ok(())
}
