//! Named, persisted conversations and the system prompt applied to them.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use session_store::{SessionStore, SessionStoreError, DEFAULT_SESSION_NAME};
use time::{Date, OffsetDateTime};

use crate::store::MessageStore;

pub const CURRENT_DATE_PLACEHOLDER: &str = "{{CURRENT_DATE}}";

/// System prompt text read once at startup. Rendering substitutes the
/// current date each time the prompt is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemPromptTemplate {
    template: Option<String>,
}

impl SystemPromptTemplate {
    /// Reads the template file. A missing or unreadable file logs a warning
    /// and yields an empty template.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(template) => Self::from_text(template),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "system prompt file not found; continuing without a system prompt");
                Self::default()
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to read system prompt file; continuing without a system prompt");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn from_text(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.template.is_none()
    }

    #[must_use]
    pub fn render(&self, date: Date) -> Option<String> {
        let template = self.template.as_ref()?;
        Some(template.replace(CURRENT_DATE_PLACEHOLDER, &format_date(date)))
    }

    #[must_use]
    pub fn render_today(&self) -> Option<String> {
        self.render(today())
    }
}

/// `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed { messages: usize },
    NotFound,
    /// The file exists but could not be read or failed validation; the
    /// session starts empty.
    Corrupt { reason: String },
    /// The name cannot address a session file; the current session is kept.
    InvalidName { reason: String },
}

pub struct SessionManager {
    store: SessionStore,
    name: String,
    log: MessageStore,
    prompt: SystemPromptTemplate,
}

impl SessionManager {
    /// Starts an empty session named `default` with the system prompt applied.
    pub fn new(store: SessionStore, prompt: SystemPromptTemplate) -> Self {
        let mut manager = Self {
            store,
            name: DEFAULT_SESSION_NAME.to_string(),
            log: MessageStore::new(),
            prompt,
        };
        manager.apply_system_prompt();
        manager
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn log(&self) -> &MessageStore {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut MessageStore {
        &mut self.log
    }

    #[must_use]
    pub fn sessions_dir(&self) -> &Path {
        self.store.root()
    }

    /// Clears the log under the current name and re-applies the system prompt.
    pub fn new_session(&mut self) {
        self.log.clear();
        self.apply_system_prompt();
        tracing::info!(session = %self.name, "started new session");
    }

    /// Persists the log under `name`, or the current name when `None`. On
    /// success the saved name becomes current.
    pub fn save(&mut self, name: Option<&str>) -> Result<PathBuf, SessionStoreError> {
        let name = name.unwrap_or(&self.name).to_string();
        let path = self.store.save(&name, self.log.all_messages())?;
        self.name = name;
        Ok(path)
    }

    /// Switches to the session stored under `name`. Missing and unreadable
    /// files both leave an empty log under the new name.
    pub fn resume(&mut self, name: &str) -> ResumeOutcome {
        let loaded = match self.store.load(name) {
            Ok(loaded) => loaded,
            Err(SessionStoreError::InvalidName { reason, .. }) => {
                return ResumeOutcome::InvalidName {
                    reason: reason.to_string(),
                }
            }
            Err(error) => {
                tracing::warn!(session = name, %error, "failed to load session; starting empty");
                self.switch_to(name, MessageStore::new());
                return ResumeOutcome::Corrupt {
                    reason: error.to_string(),
                };
            }
        };

        let Some(messages) = loaded else {
            self.switch_to(name, MessageStore::new());
            return ResumeOutcome::NotFound;
        };

        match MessageStore::from_messages(messages) {
            Ok(log) => {
                let count = log.len();
                self.switch_to(name, log);
                tracing::info!(session = name, messages = count, "resumed session");
                ResumeOutcome::Resumed { messages: count }
            }
            Err(error) => {
                tracing::warn!(session = name, %error, "saved session failed validation; starting empty");
                self.switch_to(name, MessageStore::new());
                ResumeOutcome::Corrupt {
                    reason: error.to_string(),
                }
            }
        }
    }

    pub fn list(&self) -> Result<Vec<String>, SessionStoreError> {
        self.store.list()
    }

    fn switch_to(&mut self, name: &str, log: MessageStore) {
        self.name = name.to_string();
        self.log = log;
        self.apply_system_prompt();
    }

    fn apply_system_prompt(&mut self) {
        if let Some(prompt) = self.prompt.render_today() {
            self.log.set_system_prompt(prompt);
        }
    }
}
