//! CLI command implementations.

pub mod chat;
pub mod clean;
pub mod convert;
pub mod editor;
pub mod export;
pub mod list;
