//! Error types for talkcsv.

use std::io;
use thiserror::Error;

/// Result type alias for talkcsv operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in talkcsv operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The fixed database could not be opened.
    #[error("Connection error: {0}")]
    Connection(String),

    /// An uploaded table could not be parsed or loaded.
    #[error("Load error: {0}")]
    Load(String),

    /// A history selection outside the archive's bounds.
    #[error("No such chat session: Session {index} (archive holds {len})")]
    Index {
        /// The 1-based index that was requested.
        index: usize,
        /// Archive length at the time of the request.
        len: usize,
    },

    /// The answering agent failed.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Configuration error (including a missing API key).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query was asked before any data source was selected.
    #[error("No data source selected")]
    NoDataSource,

    /// A statement against a data handle failed.
    #[error("Query error: {0}")]
    Query(#[from] rusqlite::Error),

    /// Saved chat not found.
    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    /// Storage I/O error.
    #[error("Storage error: {0}")]
    Storage(#[from] io::Error),

    /// Reading a line from the terminal failed.
    #[error("Input error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
