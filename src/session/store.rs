use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::models::UserProfile;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to write session file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Keyed persistence for the client session (tokens + cached profile).
///
/// Clones share the same entries. When backed by a file every mutation is
/// flushed to disk so the session survives restarts; nothing here validates
/// the values it holds.
#[derive(Debug, Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            path: None,
        }
    }

    /// Open a file-backed store. A missing or unreadable file yields an empty session.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => {
                    debug!(path = %path.display(), keys = map.len(), "loaded session file");
                    map
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "session file is corrupt, starting fresh");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no session file yet");
                HashMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read session file, starting fresh");
                HashMap::new()
            }
        };

        Self {
            entries: Arc::new(RwLock::new(entries)),
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    /// Store both tokens, as issued at login.
    pub async fn save(&self, access: &str, refresh: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries.insert(ACCESS_TOKEN_KEY.to_string(), access.to_string());
        entries.insert(REFRESH_TOKEN_KEY.to_string(), refresh.to_string());
        self.flush(&entries).await
    }

    /// Replace the access token only; the refresh token is left as is.
    pub async fn save_access(&self, access: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries.insert(ACCESS_TOKEN_KEY.to_string(), access.to_string());
        self.flush(&entries).await
    }

    pub async fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        let json = serde_json::to_string(user)?;
        let mut entries = self.entries.write().await;
        entries.insert(USER_KEY.to_string(), json);
        self.flush(&entries).await
    }

    pub async fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY).await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY).await
    }

    /// Cached profile, if one was stored and still parses.
    pub async fn user(&self) -> Option<UserProfile> {
        let raw = self.get(USER_KEY).await?;
        serde_json::from_str(&raw).ok()
    }

    /// Remove all three session entries together.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            entries.remove(key);
        }
        info!("session cleared");
        self.flush(&entries).await
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StorageError::Write {
                        path: path.clone(),
                        source,
                    })?;
            }
        }

        let write_err = |source| StorageError::Write {
            path: path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(path, json).await.map_err(write_err)?;

        // Holds the refresh token: owner read/write only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = tokio::fs::metadata(path).await.map_err(write_err)?.permissions();
            if perms.mode() & 0o777 != 0o600 {
                perms.set_mode(0o600);
                tokio::fs::set_permissions(path, perms).await.map_err(write_err)?;
            }
        }
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
