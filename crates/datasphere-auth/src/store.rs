//! Refresh-credential file persistence
//!
//! One file, one opaque refresh token string. Writes are atomic (temp file
//! + rename) with 0600 permissions since the file is a long-lived
//! credential. A missing or unreadable file is not an error: it means the
//! next authentication must go through the interactive flow.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Persists the refresh credential for one client configuration.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the stored refresh credential.
    ///
    /// Failure is fatal to the caller: there is no in-memory fallback, and
    /// without the file every future run needs the interactive flow again.
    pub async fn save(&self, refresh_token: &str) -> Result<()> {
        let dir = self.path.parent().ok_or_else(|| {
            Error::Persistence("refresh credential path has no parent directory".into())
        })?;

        let tmp_path = dir.join(format!(".refresh-token.tmp.{}", std::process::id()));

        fs::write(&tmp_path, refresh_token.as_bytes())
            .await
            .map_err(|e| Error::Persistence(format!("writing temp credential file: {e}")))?;

        // 0600: the file holds a long-lived credential (unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&tmp_path, perms)
                .await
                .map_err(|e| Error::Persistence(format!("setting credential file permissions: {e}")))?;
        }

        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| Error::Persistence(format!("renaming temp credential file: {e}")))?;

        debug!(path = %self.path.display(), "persisted refresh credential");
        Ok(())
    }

    /// Read the stored refresh credential.
    ///
    /// Returns `None` when the file is missing, unreadable, or empty —
    /// callers treat all three the same way: authorize interactively.
    pub async fn load(&self) -> Option<String> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no readable refresh credential");
                return None;
            }
        };

        let token = contents.trim();
        if token.is_empty() {
            warn!(path = %self.path.display(), "refresh credential file is empty");
            return None;
        }
        Some(token.to_owned())
    }
}
