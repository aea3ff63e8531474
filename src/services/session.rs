//! Session persistence
//!
//! The signed-in admin and their bearer token survive restarts in
//! `session.toml` under the config directory. The token is sealed at rest.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Admin;
use crate::error::Result;
use crate::helpers::{get_or_create_config_dir, seal, unseal};

const SESSION_FILE: &str = "session.toml";

/// An authenticated console session
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub token: String,
    pub admin: Admin,
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    /// Sealed bearer token
    token: String,
    admin: Admin,
}

/// File-backed store for the current session
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store in the platform config directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(get_or_create_config_dir()?.join(SESSION_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored session, if any. A corrupt file is treated as signed out.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let stored: StoredSession = match toml::from_str(&content) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable session");
                return Ok(None);
            }
        };

        match unseal(&stored.token) {
            Ok(token) => Ok(Some(Session {
                token,
                admin: stored.admin,
            })),
            Err(e) => {
                tracing::warn!(error = %e, "discarding session with unreadable token");
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let stored = StoredSession {
            token: seal(&session.token)?,
            admin: session.admin.clone(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(&stored)?)?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Admin {
        Admin {
            id: "1".into(),
            name: "Root".into(),
            email: "root@example.com".into(),
            created_at: None,
        }
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::at(dir.path().join(SESSION_FILE));
        assert_eq!(store.load().expect("load"), None);

        let session = Session {
            token: "tok-1".into(),
            admin: admin(),
        };
        store.save(&session).expect("save");

        let raw = fs::read_to_string(store.path()).expect("read");
        assert!(!raw.contains("tok-1"));
        assert_eq!(store.load().expect("load"), Some(session));

        store.clear().expect("clear");
        assert_eq!(store.load().expect("load"), None);
        store.clear().expect("clear twice");
    }

    #[test]
    fn test_corrupt_file_reads_as_signed_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SESSION_FILE);
        fs::write(&path, "token = \"garbage\"\n[admin]\nid = \"1\"\nname = \"R\"\nemail = \"r@x\"\n")
            .expect("write");
        assert_eq!(SessionStore::at(path).load().expect("load"), None);
    }
}
