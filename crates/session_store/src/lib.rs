//! Named JSON session files for `chat_agent` conversations.
//!
//! One file per session name, `<root>/<name>.json`, holding a pretty-printed
//! JSON array of [`agent_provider::Message`]s. Writes go through a temp file
//! and a rename so a crash never leaves a half-written session behind.

mod error;
mod paths;
mod store;

pub use error::SessionStoreError;
pub use paths::{session_file_name, validate_session_name, DEFAULT_SESSION_NAME, SESSION_EXTENSION};
pub use store::SessionStore;
