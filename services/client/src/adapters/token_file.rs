//! services/client/src/adapters/token_file.rs
//!
//! A `SessionStore` that keeps the session token in a small JSON file, the
//! command-line counterpart of the browser's persistent storage key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gougestop_core::domain::SessionToken;
use gougestop_core::ports::{PortError, PortResult, SessionStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(e: impl std::fmt::Display) -> PortError {
    PortError::Storage(e.to_string())
}

impl SessionStore for FileSessionStore {
    fn load_token(&self) -> PortResult<Option<SessionToken>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        };

        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(stored) if !stored.token.is_empty() => {
                debug!("Loaded session token saved at {}", stored.saved_at);
                Ok(Some(SessionToken::new(stored.token)))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                // An unreadable file is treated as no session at all.
                warn!("Ignoring unreadable session file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    fn save_token(&self, token: &SessionToken) -> PortResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(storage_error)?;
        }
        let stored = StoredSession {
            token: token.as_str().to_string(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(storage_error)?;
        std::fs::write(&self.path, json).map_err(storage_error)?;
        debug!("Session token written to {}", self.path.display());
        Ok(())
    }

    fn clear_token(&self) -> PortResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested/session.json"));

        assert_eq!(store.load_token().unwrap(), None);
        store.save_token(&SessionToken::new("abc")).unwrap();
        assert_eq!(store.load_token().unwrap(), Some(SessionToken::new("abc")));

        store.clear_token().unwrap();
        assert_eq!(store.load_token().unwrap(), None);
        // Clearing twice is fine.
        store.clear_token().unwrap();
    }

    #[test]
    fn corrupt_file_reads_as_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(FileSessionStore::new(path).load_token().unwrap(), None);
    }
}
