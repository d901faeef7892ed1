//! Session handling with persisted OAuth2 tokens.
//!
//! Tokens live in a directory (default `~/.garminconnect`, overridable with
//! `GARMINTOKENS`). The bearer token is read from `oauth2_token.json`.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{DownloaderError, Result};

pub const DEFAULT_TOKEN_DIR: &str = "~/.garminconnect";
pub const TOKEN_DIR_ENV: &str = "GARMINTOKENS";
pub const OAUTH2_TOKEN_FILE: &str = "oauth2_token.json";

/// OAuth2 token as persisted in the token directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expiry as Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuth2Token {
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now_secs)
    }

    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home = || {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    };

    if path == "~" {
        if let Some(home) = home() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Directory holding persisted authentication tokens.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: expand_home(path.as_ref()),
        }
    }

    /// Token store from `GARMINTOKENS`, falling back to `~/.garminconnect`.
    pub fn from_env() -> Self {
        let path = std::env::var(TOKEN_DIR_ENV).unwrap_or_else(|_| DEFAULT_TOKEN_DIR.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// JSON files present in the token directory (empty if it doesn't exist).
    pub fn token_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(_) => {
                info!("[TokenStore] No token directory at {}", self.path.display());
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        if files.is_empty() {
            warn!(
                "[TokenStore] Token directory {} exists but no token files found",
                self.path.display()
            );
        } else {
            info!(
                "[TokenStore] Found {} token file(s) in {}",
                files.len(),
                self.path.display()
            );
        }
        files
    }

    /// Load the OAuth2 token.
    pub fn load(&self) -> Result<OAuth2Token> {
        let file = self.path.join(OAUTH2_TOKEN_FILE);
        debug!("[TokenStore] Loading {}", file.display());

        let contents = match fs::read_to_string(&file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DownloaderError::Authentication {
                    message: format!(
                        "No valid tokens found in {}. Please log in to create new tokens.",
                        self.path.display()
                    ),
                })
            }
            Err(e) => {
                return Err(DownloaderError::TokenStore {
                    path: file,
                    message: e.to_string(),
                })
            }
        };

        serde_json::from_str(&contents).map_err(|e| DownloaderError::TokenStore {
            path: file,
            message: format!("unreadable token file: {}", e),
        })
    }
}

/// Authenticated session used to build API requests.
#[derive(Debug, Clone)]
pub struct Session {
    token: OAuth2Token,
}

impl Session {
    /// Session from a raw bearer access token.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self {
            token: OAuth2Token {
                access_token: access_token.into(),
                token_type: default_token_type(),
                expires_at: None,
            },
        }
    }

    /// Session from the token store; expired tokens are rejected.
    pub fn from_store(store: &TokenStore) -> Result<Self> {
        let token = store.load()?;
        if token.is_expired_at(chrono::Utc::now().timestamp()) {
            return Err(DownloaderError::Authentication {
                message: "Saved token has expired. Please log in again to refresh it.".to_string(),
            });
        }
        info!(
            "[Session] Using saved authentication token from {}",
            store.path().display()
        );
        Ok(Self { token })
    }

    pub fn authorization_header(&self) -> String {
        self.token.authorization_header()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(contents: Option<&str>) -> (tempfile::TempDir, TokenStore) {
        let dir = tempfile::tempdir().unwrap();
        if let Some(contents) = contents {
            fs::write(dir.path().join(OAUTH2_TOKEN_FILE), contents).unwrap();
        }
        let store = TokenStore::new(dir.path().to_string_lossy());
        (dir, store)
    }

    #[test]
    fn test_load_token() {
        let (_dir, store) = store_with(Some(
            r#"{"access_token":"abc","token_type":"Bearer","expires_at":4102444800,"scope":"x"}"#,
        ));
        let session = Session::from_store(&store).unwrap();
        assert_eq!(session.authorization_header(), "Bearer abc");
        assert_eq!(store.token_files().len(), 1);
    }

    #[test]
    fn test_missing_token_is_authentication_error() {
        let (_dir, store) = store_with(None);
        assert!(matches!(
            Session::from_store(&store),
            Err(DownloaderError::Authentication { .. })
        ));
        assert!(store.token_files().is_empty());
    }

    #[test]
    fn test_expired_token() {
        let (_dir, store) = store_with(Some(r#"{"access_token":"abc","expires_at":1}"#));
        assert!(matches!(
            Session::from_store(&store),
            Err(DownloaderError::Authentication { .. })
        ));
    }

    #[test]
    fn test_corrupt_token_file() {
        let (_dir, store) = store_with(Some("not json"));
        assert!(matches!(
            store.load(),
            Err(DownloaderError::TokenStore { .. })
        ));
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/tmp/tokens"), PathBuf::from("/tmp/tokens"));
    }
}
