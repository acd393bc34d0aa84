//! crates/gougestop_core/src/session.rs
//!
//! An in-memory `SessionStore`, used when nothing should outlive the process.

use std::sync::Mutex;

use crate::domain::SessionToken;
use crate::ports::{PortError, PortResult, SessionStore};

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: Mutex<Option<SessionToken>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: SessionToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }

    fn slot(&self) -> PortResult<std::sync::MutexGuard<'_, Option<SessionToken>>> {
        self.token
            .lock()
            .map_err(|_| PortError::Storage("session store lock poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load_token(&self) -> PortResult<Option<SessionToken>> {
        Ok(self.slot()?.clone())
    }

    fn save_token(&self, token: &SessionToken) -> PortResult<()> {
        *self.slot()? = Some(token.clone());
        Ok(())
    }

    fn clear_token(&self) -> PortResult<()> {
        *self.slot()? = None;
        Ok(())
    }
}
