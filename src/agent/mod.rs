//! Answering questions against a data handle.

pub mod llm;
pub mod prompt;
pub mod sql;

pub use llm::{ChatMessage, ChatModel, LlmClient};
pub use sql::SqlAgent;

use crate::data::DataHandle;
use crate::error::Result;

/// Answers a natural-language question using a data handle.
///
/// Calls may block for as long as the answer takes; there is no cancellation.
pub trait QueryAnswerer {
    /// Answer `query` using `handle`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Agent` for any failure while producing the answer.
    fn answer(&self, handle: &DataHandle, query: &str) -> Result<String>;
}
