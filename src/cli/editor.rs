//! Line editing for the interactive chat: history and slash-command completion.

use crate::app::ChatApp;
use crate::cli::chat::handle_line;
use crate::error::Result;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::History;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::io::Write;

/// Prompt shown before each line.
pub const PROMPT: &str = ">> ";

/// File under the storage directory that keeps input history between runs.
pub const HISTORY_FILE: &str = "history.txt";

const COMMANDS: [&str; 10] = [
    "/fixed", "/upload", "/new", "/clear", "/history", "/load", "/show", "/share", "/help",
    "/quit",
];

/// Slash commands starting with `prefix`. Only the command word completes.
#[must_use]
pub fn command_completions(prefix: &str) -> Vec<&'static str> {
    if !prefix.starts_with('/') || prefix.contains(char::is_whitespace) {
        return Vec::new();
    }
    COMMANDS
        .iter()
        .copied()
        .filter(|cmd| cmd.starts_with(prefix))
        .collect()
}

/// Editor helper completing and hinting slash commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatHelper;

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let candidates = command_completions(&line[..pos])
            .into_iter()
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let prefix = &line[..pos];
        match command_completions(prefix).as_slice() {
            [only] if only.len() > prefix.len() => Some(only[prefix.len()..].to_string()),
            _ => None,
        }
    }
}

impl Highlighter for ChatHelper {}

impl Validator for ChatHelper {}

/// Read lines from `editor` until EOF or `/quit`, calling `after` after each one.
///
/// Ctrl-C discards the line being typed and keeps the chat going.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read or output cannot be written.
pub fn run_editor<H: Helper, I: History, W: Write>(
    app: &mut ChatApp,
    editor: &mut Editor<H, I>,
    out: &mut W,
    preview_rows: usize,
    mut after: impl FnMut(&ChatApp),
) -> Result<()> {
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    editor.add_history_entry(line.as_str())?;
                }
                if !handle_line(app, &line, out, preview_rows)? {
                    break;
                }
                after(app);
            }
            Err(ReadlineError::Interrupted) => {
                writeln!(out, "Ctrl-C detected. Type /quit to leave.")?;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    after(app);
    Ok(())
}
