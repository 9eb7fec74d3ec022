//! Core chat state.

pub mod chat;
pub mod saved;

pub use chat::{ChatSessionStore, GREETING, Message, Role, Session};
pub use saved::SavedChat;
