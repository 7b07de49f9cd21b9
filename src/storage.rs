//! Persistence of the single session record.

use crate::error::{Result, SessionError};
use crate::session::{Session, SessionStatus};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Holds zero or one session record
pub trait SessionStore {
    fn save(&self, session: &Session) -> Result<()>;

    /// Returns `None` if no record exists. The status is as persisted and may be stale.
    fn load(&self) -> Result<Option<Session>>;

    fn exists(&self) -> bool;

    /// Removing a missing record is not an error
    fn delete(&self) -> Result<()>;
}

/// On-disk shape. Timestamps are required; the status is only a cache of
/// what they imply, so a missing or unknown value is re-derived.
#[derive(Deserialize)]
struct StoredSession {
    created_at: NaiveDateTime,
    expires_at: NaiveDateTime,
    #[serde(default)]
    status: Option<Value>,
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        let status = stored
            .status
            .and_then(|v| serde_json::from_value::<SessionStatus>(v).ok());
        match status {
            Some(status) => Session {
                created_at: stored.created_at,
                expires_at: stored.expires_at,
                status,
            },
            None => {
                tracing::debug!("stored status missing or unknown, re-deriving");
                Session::from_persisted(stored.created_at, stored.expires_at)
            }
        }
    }
}

/// Session record stored as one JSON object in a file
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

impl SessionStore for FileSessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Storage(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = serde_json::to_string_pretty(session)
            .map_err(|e| SessionError::Storage(format!("failed to serialize session: {}", e)))?;
        std::fs::write(&self.path, content)
            .map_err(|e| SessionError::Storage(format!("failed to save session: {}", e)))?;

        tracing::debug!(path = %self.path.display(), status = %session.status, "session saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<Session>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "failed to load session: {}",
                    e
                )))
            }
        };

        let stored: StoredSession = serde_json::from_str(&content).map_err(|e| {
            SessionError::Storage(format!(
                "failed to load session from {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(stored.into()))
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "session file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Storage(format!(
                "failed to delete session: {}",
                e
            ))),
        }
    }
}
