//! The chat controller: wires data sources, the answerer and the session store.
//!
//! Every error the core can raise is caught here and turned into a notice;
//! nothing that happens during a chat is fatal.

use crate::agent::QueryAnswerer;
use crate::core::ChatSessionStore;
use crate::data::handle::quote_ident;
use crate::data::{DataHandle, DataSourceResolver, QueryResult, Selection, TableUpload};
use crate::error::{Error, Result};
use std::path::Path;
use std::rc::Rc;
use tracing::{info, warn};

/// Chat state for one interactive user.
pub struct ChatApp {
    chat: ChatSessionStore,
    resolver: DataSourceResolver,
    answerer: Option<Box<dyn QueryAnswerer>>,
    missing_answerer: Option<String>,
    selection: Option<Selection>,
}

impl ChatApp {
    /// Create an app around an existing chat.
    #[must_use]
    pub fn new(chat: ChatSessionStore, resolver: DataSourceResolver) -> Self {
        Self {
            chat,
            resolver,
            answerer: None,
            missing_answerer: Some("No answering agent configured".to_string()),
            selection: None,
        }
    }

    /// Attach the answering agent.
    #[must_use]
    pub fn with_answerer(mut self, answerer: Box<dyn QueryAnswerer>) -> Self {
        self.answerer = Some(answerer);
        self.missing_answerer = None;
        self
    }

    /// Record why no answerer is available, shown when a question is asked.
    #[must_use]
    pub fn without_answerer(mut self, reason: impl Into<String>) -> Self {
        self.answerer = None;
        self.missing_answerer = Some(reason.into());
        self
    }

    /// Notice to show up front, if the app cannot answer questions.
    #[must_use]
    pub fn startup_notice(&self) -> Option<&str> {
        self.missing_answerer.as_deref()
    }

    /// The chat sessions.
    #[must_use]
    pub fn chat(&self) -> &ChatSessionStore {
        &self.chat
    }

    /// The current selection, if any.
    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Chat with the fixed database.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the database cannot be opened. The
    /// chat is untouched and no source stays selected.
    pub fn select_fixed(&mut self) -> Result<Rc<DataHandle>> {
        self.select(Selection::Fixed)
    }

    /// Chat with an uploaded table.
    ///
    /// # Errors
    ///
    /// Returns `Error::Load` if the upload cannot be parsed. The chat is
    /// untouched and no source stays selected.
    pub fn select_upload(&mut self, upload: TableUpload) -> Result<Rc<DataHandle>> {
        self.select(Selection::Upload(upload))
    }

    fn select(&mut self, selection: Selection) -> Result<Rc<DataHandle>> {
        match self.resolver.resolve(&selection) {
            Ok(handle) => {
                info!(provenance = %handle.provenance(), source = handle.label(), "selected data source");
                self.selection = Some(selection);
                Ok(handle)
            }
            Err(e) => {
                warn!(error = %e, "data source selection failed");
                self.selection = None;
                Err(e)
            }
        }
    }

    /// First rows of the uploaded table, for showing what was loaded.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoDataSource` unless an upload is selected.
    pub fn preview(&mut self, rows: usize) -> Result<QueryResult> {
        let Some(selection @ Selection::Upload(_)) = self.selection.clone() else {
            return Err(Error::NoDataSource);
        };
        let handle = self.resolver.resolve(&selection)?;
        let sql = format!("SELECT * FROM {}", quote_ident(self.resolver.table_name()));
        handle.run_query(&sql, rows)
    }

    /// Ask a question.
    ///
    /// The question is always recorded. The answer is recorded only on success.
    ///
    /// # Errors
    ///
    /// Returns the error to show the user: no source selected, source could
    /// not be resolved, missing credential, or agent failure.
    pub fn ask(&mut self, text: &str) -> Result<String> {
        self.chat.submit_user(text);

        let answer = self.answer(text);
        match &answer {
            Ok(reply) => self.chat.submit_assistant(reply.clone()),
            Err(e) => warn!(error = %e, "query failed"),
        }
        answer
    }

    fn answer(&mut self, text: &str) -> Result<String> {
        let selection = self.selection.clone().ok_or(Error::NoDataSource)?;
        let handle = self.resolver.resolve(&selection)?;
        let answerer = self.answerer.as_ref().ok_or_else(|| {
            Error::Config(
                self.missing_answerer
                    .clone()
                    .unwrap_or_else(|| "No answering agent configured".to_string()),
            )
        })?;
        answerer.answer(&handle, text)
    }

    /// Archive the current chat and start a new one.
    pub fn new_chat(&mut self) {
        self.chat.new_session();
    }

    /// Reset the current chat to the greeting.
    pub fn clear_chat(&mut self) {
        self.chat.clear_session();
    }

    /// Load an archived chat by 1-based index.
    ///
    /// # Errors
    ///
    /// Returns `Error::Index` if no such session exists; the current chat is unchanged.
    pub fn select_history(&mut self, index: usize) -> Result<()> {
        self.chat.select_archived(index)
    }

    /// Write the current chat to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn export(&self, path: &Path) -> Result<()> {
        self.chat.export_to(path)
    }

    /// Give up the chat state, for saving.
    #[must_use]
    pub fn into_chat(self) -> ChatSessionStore {
        self.chat
    }
}
