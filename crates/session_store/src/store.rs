use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use agent_provider::Message;
use uuid::Uuid;

use crate::error::SessionStoreError;
use crate::paths::{session_file_name, session_name_from_path, validate_session_name};

/// Directory of named session files.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, SessionStoreError> {
        validate_session_name(name)?;
        Ok(self.root.join(session_file_name(name)))
    }

    /// Writes `messages` under `name`, replacing any previous file.
    ///
    /// The session directory is created on first save.
    pub fn save(&self, name: &str, messages: &[Message]) -> Result<PathBuf, SessionStoreError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.root).map_err(|source| {
            SessionStoreError::io("creating session directory", &self.root, source)
        })?;

        let mut body = serde_json::to_vec_pretty(messages)
            .map_err(|source| SessionStoreError::json_serialize(&path, source))?;
        body.push(b'\n');

        let temp_path = self.root.join(format!(".{name}.{}.tmp", Uuid::new_v4()));
        if let Err(error) = write_synced(&temp_path, &body) {
            let _ = fs::remove_file(&temp_path);
            return Err(error);
        }
        if let Err(source) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(SessionStoreError::io("replacing session file", &path, source));
        }

        tracing::debug!(session = name, messages = messages.len(), path = %path.display(), "session saved");
        Ok(path)
    }

    /// Reads the session stored under `name`. A missing file is `Ok(None)`.
    pub fn load(&self, name: &str) -> Result<Option<Vec<Message>>, SessionStoreError> {
        let path = self.path_for(name)?;
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SessionStoreError::io("reading session file", &path, source))
            }
        };

        let messages = serde_json::from_slice::<Vec<Message>>(&body)
            .map_err(|source| SessionStoreError::json_parse(&path, source))?;
        tracing::debug!(session = name, messages = messages.len(), "session loaded");
        Ok(Some(messages))
    }

    /// Names of saved sessions, sorted. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>, SessionStoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionStoreError::io(
                    "listing session directory",
                    &self.root,
                    source,
                ))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                SessionStoreError::io("listing session directory", &self.root, source)
            })?;
            let is_file = entry.file_type().map(|kind| kind.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = session_name_from_path(&entry.path()) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

fn write_synced(path: &Path, body: &[u8]) -> Result<(), SessionStoreError> {
    let mut file = fs::File::create(path)
        .map_err(|source| SessionStoreError::io("creating temporary session file", path, source))?;
    file.write_all(body)
        .map_err(|source| SessionStoreError::io("writing temporary session file", path, source))?;
    file.sync_all()
        .map_err(|source| SessionStoreError::io("syncing temporary session file", path, source))
}
