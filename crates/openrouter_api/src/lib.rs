//! Transport-only OpenRouter chat-completions client primitives.
//!
//! This crate owns request building, retry, and response parsing for the
//! `/chat/completions` endpoint. It intentionally contains no conversation
//! state and no UI coupling; payloads are carried as JSON values so that the
//! provider adapter owns the mapping to the shared message model.
//!
//! Web-search augmentation is requested through the `web` plugin, and tool
//! advertisement through the `tools` array. [`OpenRouterClient`] refuses
//! to carry both.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod response;
pub mod retry;
pub mod url;

pub use client::OpenRouterClient;
pub use config::OpenRouterConfig;
pub use error::OpenRouterApiError;
pub use payload::ChatCompletionRequest;
pub use response::{ChatCompletionResponse, ResponseMessage};
pub use url::normalize_chat_completions_url;
