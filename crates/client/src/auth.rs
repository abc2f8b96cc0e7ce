//! Bearer-token storage for the archive API.
//!
//! Credentials live in `~/.config/glotgrid/auth.json`, next to the
//! editor settings. The file is plain JSON with 0600 permissions on
//! Unix; there is no keychain involvement, so a missing or garbled
//! file simply means "not logged in".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The stored login: token, server, and optional display identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCredentials {
    pub token: String,
    /// e.g. "https://archive.example.org"
    pub api_base: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthCredentials {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.into(),
            username: None,
            email: None,
        }
    }
}

/// Where the credentials file lives. `None` when the platform has no
/// config directory.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("glotgrid/auth.json"))
}

/// Load the stored login, or `None` when there is none (missing file,
/// unreadable file, or a shape that no longer parses).
pub fn load_auth() -> Option<AuthCredentials> {
    load_from(&auth_file_path()?)
}

fn load_from(path: &Path) -> Option<AuthCredentials> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Persist the login, creating the config directory if needed.
pub fn save_auth(creds: &AuthCredentials) -> Result<(), String> {
    let path = auth_file_path().ok_or("could not determine config directory")?;
    save_to(creds, &path)
}

fn save_to(creds: &AuthCredentials, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("could not create config directory: {e}"))?;
    }
    let contents = serde_json::to_string_pretty(creds)
        .map_err(|e| format!("could not serialize credentials: {e}"))?;
    std::fs::write(path, &contents).map_err(|e| format!("could not write auth file: {e}"))?;

    // The token is a bearer credential; keep it owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| format!("could not restrict auth file permissions: {e}"))?;
    }

    Ok(())
}

/// Log out: remove the credentials file. Succeeds when there was
/// nothing to remove.
pub fn delete_auth() -> Result<(), String> {
    let Some(path) = auth_file_path() else {
        return Ok(());
    };
    if path.exists() {
        std::fs::remove_file(&path).map_err(|e| format!("could not delete auth file: {e}"))?;
    }
    Ok(())
}
