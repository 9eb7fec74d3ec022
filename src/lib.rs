//! talkcsv - chat with a SQLite database or a CSV file.
//!
//! Questions are answered by a hosted LLM agent with SQL tool access over
//! either a read-only database file or an in-memory copy of an uploaded table.

pub mod agent;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod logging;
pub mod storage;

pub use app::ChatApp;
pub use config::Config;
pub use error::{Error, Result};
