use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use omd_types::AuthSession;

/// Persists the signed-in auth session between CLI runs.
///
/// The session is stored as JSON in `~/.omd/session.json` with 0600
/// permissions so only the owner can read the tokens.
#[derive(Debug, Clone)]
pub struct SessionStore {
    file_path: PathBuf,
}

impl SessionStore {
    /// Creates a store at the default path `~/.omd/session.json`.
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(Self {
            file_path: home_dir.join(".omd").join("session.json"),
        })
    }

    /// Creates a store at an explicit path.
    pub fn at(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    /// Loads the saved session.
    ///
    /// - `Ok(Some(session))` if the file exists and parses
    /// - `Ok(None)` if the file is missing, empty or corrupted
    /// - `Err(_)` if the file cannot be read
    pub fn load(&self) -> Result<Option<AuthSession>> {
        if !self.file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.file_path).context("Failed to read session file")?;
        if content.trim().is_empty() {
            tracing::warn!("Session file is empty, treating as no session");
            return Ok(None);
        }

        match serde_json::from_str::<AuthSession>(&content) {
            Ok(session) if !session.access_token.trim().is_empty() => {
                tracing::debug!("Loaded session from {}", self.file_path.display());
                Ok(Some(session))
            }
            Ok(_) => {
                tracing::warn!("Session file has no access token, treating as corrupted");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Session file is corrupted ({}), ignoring it", e);
                Ok(None)
            }
        }
    }

    /// Saves the session atomically with 0600 permissions.
    pub fn save(&self, session: &AuthSession) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).context("Failed to create .omd directory")?;
        }

        let json = serde_json::to_string_pretty(session).context("Failed to serialize session")?;

        // Use atomic write: write to temporary file, then rename
        let temp_path = self.file_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).context("Failed to create temporary session file")?;
        file.write_all(json.as_bytes())
            .context("Failed to write session")?;
        file.sync_all().context("Failed to sync session file to disk")?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&temp_path, permissions)
                .context("Failed to set session file permissions")?;
        }

        fs::rename(&temp_path, &self.file_path).context("Failed to rename temporary session file")?;

        tracing::info!("Saved session to {}", self.file_path.display());
        Ok(())
    }

    /// Deletes the session file. Missing files are not an error.
    pub fn delete(&self) -> Result<()> {
        if self.file_path.exists() {
            fs::remove_file(&self.file_path).context("Failed to delete session file")?;
            tracing::info!("Deleted session file at {}", self.file_path.display());
        } else {
            tracing::debug!("Session file does not exist, nothing to delete");
        }
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.file_path
    }
}
