use std::path::Path;

use crate::error::SessionStoreError;

pub const DEFAULT_SESSION_NAME: &str = "default";
pub const SESSION_EXTENSION: &str = "json";

/// Rejects names that would escape the session directory or hide the file.
pub fn validate_session_name(name: &str) -> Result<(), SessionStoreError> {
    let reason = if name.trim().is_empty() {
        Some("name is empty")
    } else if name != name.trim() {
        Some("name has surrounding whitespace")
    } else if name.contains(['/', '\\']) {
        Some("name contains a path separator")
    } else if name.starts_with('.') {
        Some("name starts with '.'")
    } else if name.chars().any(char::is_control) {
        Some("name contains control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SessionStoreError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[must_use]
pub fn session_file_name(name: &str) -> String {
    format!("{name}.{SESSION_EXTENSION}")
}

/// Session name for a directory entry, if it looks like a session file.
pub(crate) fn session_name_from_path(path: &Path) -> Option<String> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(SESSION_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    validate_session_name(stem).ok()?;
    Some(stem.to_string())
}
