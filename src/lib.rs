//! Interactive terminal chat client with human-approved shell tools.
//!
//! ## Provider bootstrap
//!
//! - `CHAT_AGENT_PROVIDER=openrouter` (default) talks to an OpenRouter-compatible
//!   chat-completions endpoint and requires `OPENROUTER_API_KEY`
//! - `CHAT_AGENT_PROVIDER=mock` answers locally and needs no network
//!
//! Optional overrides: `CHAT_AGENT_MODEL`, `CHAT_AGENT_BASE_URL`,
//! `CHAT_AGENT_SESSIONS_DIR`, `CHAT_AGENT_PROMPT_FILE`,
//! `CHAT_AGENT_SHELL_TIMEOUT_SEC` and `CHAT_AGENT_LOG` (a `tracing` filter,
//! `warn` by default). `CHAT_AGENT_CONFIG_PATH` may point at a JSON file:
//!
//! ```json
//! {
//!   "model": "openai/gpt-4o",
//!   "base_url": "https://openrouter.ai/api/v1",
//!   "sessions_dir": "chats",
//!   "prompt_file": "agent_manual.md",
//!   "timeout_sec": 120,
//!   "shell_timeout_sec": 60
//! }
//! ```
//!
//! Every field is optional, unknown fields are rejected, and environment
//! variables win over file values.
//!
//! ## Turn contract
//!
//! Each user message is answered by one tool-enabled exchange. Tool calls are
//! staged and written to the log only together with one result per call.
//! Shell commands wait for an explicit allow/deny/advise/cancel decision; web
//! searches trigger a follow-up exchange with the provider's web plugin.
//!
//! ## System prompt
//!
//! The prompt file is read once at startup. `{{CURRENT_DATE}}` is replaced with
//! the local date (`YYYY-MM-DD`) whenever the prompt is applied to a session.

pub mod app;
pub mod commands;
pub mod config;
pub mod logging;
pub mod mediator;
pub mod providers;
pub mod session;
pub mod store;
pub mod tools;
pub mod ui;
