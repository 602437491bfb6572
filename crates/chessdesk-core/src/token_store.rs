//! Bearer token persistence.
//!
//! Exactly one secret is stored: the access token, keyed by a fixed
//! service/account identifier. The platform credential store is the default;
//! a 0600 JSON file serves headless machines. Tokens are never logged or
//! displayed in full.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};

use crate::config::{TokenStoreKind, paths};

/// Credential store service name.
pub const KEYRING_SERVICE: &str = "chessdesk";

/// Credential store account name.
pub const KEYRING_ACCOUNT: &str = "lichess-access-token";

/// Key the access token is stored under in the credentials file.
pub const TOKEN_KEY: &str = "chessdesk/lichess-access-token";

/// Environment variable that supplies a token without touching the store.
pub const TOKEN_ENV: &str = "CHESSDESK_TOKEN";

/// Get/set access to the bearer token. `Ok(None)` means nobody has logged in yet.
pub trait TokenStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    fn get_token(&self) -> Result<Option<String>>;

    /// # Errors
    /// Returns an error if the backing store cannot be written.
    fn set_token(&self, token: &str) -> Result<()>;

    /// # Errors
    /// Returns an error if the backing store cannot be written.
    fn clear(&self) -> Result<()>;

    fn has_token(&self) -> bool {
        matches!(self.get_token(), Ok(Some(_)))
    }
}

/// Shows only a short prefix of a token.
pub fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…")
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.trim().is_empty())
}

/// Opens the configured backend. If the platform credential store cannot be
/// opened, the credentials file is used instead.
pub fn open_token_store(kind: TokenStoreKind) -> Arc<dyn TokenStore> {
    match kind {
        TokenStoreKind::File => Arc::new(FileTokenStore::default()),
        TokenStoreKind::Keyring => match KeyringTokenStore::new() {
            Ok(store) => Arc::new(store),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "credential store unavailable, using credentials file");
                Arc::new(FileTokenStore::default())
            }
        },
    }
}

/// Token store backed by the platform credential store (Keychain, Secret
/// Service, Credential Manager).
pub struct KeyringTokenStore {
    entry: keyring::Entry,
}

impl KeyringTokenStore {
    /// # Errors
    /// Returns an error if the platform credential store cannot be opened.
    pub fn new() -> Result<Self> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)
            .context("Failed to open credential store entry")?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn get_token(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(token) => Ok(non_empty(Some(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err).context("Failed to read token from credential store"),
        }
    }

    fn set_token(&self, token: &str) -> Result<()> {
        self.entry
            .set_password(token)
            .context("Failed to write token to credential store")
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err).context("Failed to delete token from credential store"),
        }
    }
}

/// Token store backed by a JSON file with restricted permissions (0600).
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new(paths::credentials_path())
    }
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials from {}", self.path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials from {}", self.path.display()))
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(entries).context("Failed to serialize credentials")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get_token(&self) -> Result<Option<String>> {
        Ok(non_empty(self.load()?.remove(TOKEN_KEY)))
    }

    fn set_token(&self, token: &str) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(TOKEN_KEY.to_string(), token.to_string());
        self.save(&entries)
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.load()?;
        if entries.remove(TOKEN_KEY).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_token(&self) -> Result<Option<String>> {
        let guard = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(non_empty(guard.clone()))
    }

    fn set_token(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Read-through override: a fixed token (typically from `CHESSDESK_TOKEN`) in
/// front of another store. Writes go to the inner store.
pub struct EnvTokenStore {
    token: Option<String>,
    inner: Arc<dyn TokenStore>,
}

impl EnvTokenStore {
    pub fn from_env(inner: Arc<dyn TokenStore>) -> Self {
        Self::new(std::env::var(TOKEN_ENV).ok(), inner)
    }

    pub fn new(token: Option<String>, inner: Arc<dyn TokenStore>) -> Self {
        Self {
            token: non_empty(token),
            inner,
        }
    }

    /// True if reads are answered by the fixed token rather than the inner store.
    pub fn is_overridden(&self) -> bool {
        self.token.is_some()
    }
}

impl TokenStore for EnvTokenStore {
    fn get_token(&self) -> Result<Option<String>> {
        match &self.token {
            Some(token) => Ok(Some(token.clone())),
            None => self.inner.get_token(),
        }
    }

    fn set_token(&self, token: &str) -> Result<()> {
        self.inner.set_token(token)
    }

    fn clear(&self) -> Result<()> {
        if self.is_overridden() {
            tracing::warn!("{TOKEN_ENV} is set; it keeps supplying a token after logout");
        }
        self.inner.clear()
    }
}
