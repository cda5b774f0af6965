//! Session persistence.
//!
//! The session store is the single owner of the bearer token. Login,
//! registration, logout and a rejected token are the only paths that write
//! it; every other component reads.
//!
//! No expiry validation happens here. Callers that care about freshness
//! decode the token with [`crate::token`].

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tienda_core::UserId;

/// Errors from reading or writing a persisted session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The user summary returned alongside the tokens at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone)]
pub struct Session {
    /// Bearer token sent with every authenticated request.
    pub access_token: SecretString,
    /// Token accepted only by the refresh endpoint.
    pub refresh_token: Option<SecretString>,
    pub user: Option<SessionUser>,
}

impl Session {
    /// A session holding only an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
            user: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::from(refresh_token.into()));
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: SessionUser) -> Self {
        self.user = Some(user);
        self
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("user", &self.user)
            .finish()
    }
}

/// Storage for the current session.
///
/// Implementations must make `clear_session` idempotent: clearing an empty
/// store succeeds and changes nothing.
pub trait SessionStore: Send + Sync {
    /// The current session, if any.
    fn session(&self) -> Option<Session>;

    /// Replace the current session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session cannot be persisted.
    fn set_session(&self, session: Session) -> Result<(), SessionError>;

    /// Forget the current session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if persisted state cannot be removed.
    fn clear_session(&self) -> Result<(), SessionError>;

    /// The current access token, if any.
    fn token(&self) -> Option<SecretString> {
        self.session().map(|s| s.access_token)
    }

    /// Whether a token is present. Says nothing about its validity.
    fn has_session(&self) -> bool {
        self.token().is_some()
    }
}

// =============================================================================
// MemorySessionStore
// =============================================================================

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    current: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts with `session`.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            current: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn session(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session(&self, session: Session) -> Result<(), SessionError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    fn clear_session(&self) -> Result<(), SessionError> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

// =============================================================================
// FileSessionStore
// =============================================================================

/// On-disk layout, mirroring the keys the browser client kept in local storage.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<SessionUser>,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            token: session.access_token.expose_secret().to_string(),
            refresh_token: session
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            user: session.user.clone(),
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            access_token: SecretString::from(stored.token),
            refresh_token: stored.refresh_token.map(SecretString::from),
            user: stored.user,
        }
    }
}

/// Session store persisted as a JSON file.
///
/// The file is read once at open and rewritten on every change. A missing
/// file is an anonymous session.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl FileSessionStore {
    /// Open the store, loading any session already on disk.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        let current = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let stored: StoredSession =
                    serde_json::from_str(&raw).map_err(|source| SessionError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                Some(Session::from(stored))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(SessionError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), present = current.is_some(), "session store opened");
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, session: &Session) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(&StoredSession::from(session)).map_err(|source| {
            SessionError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, body).map_err(io_err)
    }
}

impl SessionStore for FileSessionStore {
    fn session(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session(&self, session: Session) -> Result<(), SessionError> {
        self.write_file(&session)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    fn clear_session(&self) -> Result<(), SessionError> {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => {
                // Memory is already cleared; a stale file must not resurrect it.
                tracing::error!(path = %self.path.display(), error = %source, had_session = previous.is_some(), "failed to remove session file");
                Err(SessionError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}
