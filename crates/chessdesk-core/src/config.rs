//! Configuration management for chessdesk.
//!
//! Loads configuration from ${CHESSDESK_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding `[server] base_url`.
pub const BASE_URL_ENV: &str = "CHESSDESK_BASE_URL";

pub mod paths {
    //! Path resolution for chessdesk configuration and data directories.
    //!
    //! CHESSDESK_HOME resolution order:
    //! 1. CHESSDESK_HOME environment variable (if set)
    //! 2. ~/.config/chessdesk (default)

    use std::path::PathBuf;

    /// Returns the chessdesk home directory.
    ///
    /// Falls back to a relative `.chessdesk` directory when no home directory
    /// can be determined.
    pub fn chessdesk_home() -> PathBuf {
        if let Ok(home) = std::env::var("CHESSDESK_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".chessdesk"),
            |h| h.join(".config").join("chessdesk"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        chessdesk_home().join("config.toml")
    }

    /// Returns the path to the stored credentials.
    pub fn credentials_path() -> PathBuf {
        chessdesk_home().join("credentials.json")
    }

    /// Returns the directory for log files.
    pub fn logs_dir() -> PathBuf {
        chessdesk_home().join("logs")
    }
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: Config::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Backend for the stored access token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    Keyring,
    File,
}

/// OAuth client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: String,
    /// Exact redirect URI registered with the server; the local listener binds its host, port and path.
    pub redirect_uri: String,
    pub scopes: String,
    pub callback_timeout_secs: u64,
    pub token_store: TokenStoreKind,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: "chess-dinikowski".to_string(),
            redirect_uri: "http://localhost:8080/lichess/oauth2/".to_string(),
            scopes: "challenge:read challenge:write challenge:bulk board:play".to_string(),
            callback_timeout_secs: 120,
            token_store: TokenStoreKind::Keyring,
        }
    }
}

impl AuthConfig {
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

/// Reconnect policy and timeouts for the long-lived NDJSON streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub error_backoff_secs: u64,
    pub rate_limit_backoff_secs: u64,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            error_backoff_secs: 5,
            rate_limit_backoff_secs: 60,
            connect_timeout_secs: 30,
            idle_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub stream: StreamConfig,
    pub http: HttpConfig,
}

impl Config {
    pub const DEFAULT_BASE_URL: &str = "https://lichess.org";

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default config to `path`.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// Resolves the server endpoints with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the resolved base URL is not a valid URL.
    pub fn endpoints(&self) -> Result<Endpoints> {
        let env_value = std::env::var(BASE_URL_ENV).ok();
        let base_url = resolve_base_url(env_value.as_deref(), &self.server.base_url)?;
        Ok(Endpoints::new(&base_url))
    }
}

/// Picks the first non-empty of env and config values, falling back to the default.
fn resolve_base_url(env_value: Option<&str>, config_value: &str) -> Result<String> {
    let chosen = [env_value, Some(config_value)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(Config::DEFAULT_BASE_URL);

    url::Url::parse(chosen).with_context(|| format!("Invalid server base URL: {chosen}"))?;
    Ok(chosen.trim_end_matches('/').to_string())
}

/// Server endpoints derived from one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn authorization(&self) -> String {
        format!("{}/oauth", self.base_url)
    }

    pub fn token(&self) -> String {
        format!("{}/api/token", self.base_url)
    }

    pub fn account(&self) -> String {
        format!("{}/api/account", self.base_url)
    }

    pub fn playing(&self) -> String {
        format!("{}/api/account/playing", self.base_url)
    }

    pub fn event_stream(&self) -> String {
        format!("{}/api/stream/event", self.base_url)
    }

    pub fn game_stream(&self, game_id: &str) -> String {
        format!("{}/api/board/game/stream/{game_id}", self.base_url)
    }

    pub fn seek(&self) -> String {
        format!("{}/api/board/seek", self.base_url)
    }

    pub fn board_game(&self, game_id: &str) -> String {
        format!("{}/api/board/game/{game_id}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.stream.error_backoff_secs, 5);
        assert_eq!(config.stream.rate_limit_backoff_secs, 60);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "[stream]\nerror_backoff_secs = 2\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.stream.error_backoff_secs, 2);
        assert_eq!(config.stream.rate_limit_backoff_secs, 60);
        assert_eq!(config.auth, AuthConfig::default());
    }

    #[test]
    fn test_token_store_kind_parses() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[auth]\ntoken_store = \"file\"\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.auth.token_store, TokenStoreKind::File);
        assert_eq!(Config::default().auth.token_store, TokenStoreKind::Keyring);
    }

    #[test]
    fn test_load_invalid_toml_reports_path() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[stream\n").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn test_init_writes_template_matching_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config, Config::default());
        assert!(Config::init(&config_path).is_err());
    }

    #[test]
    fn test_base_url_precedence() {
        assert_eq!(
            resolve_base_url(Some("http://127.0.0.1:9000/"), "https://example.org").unwrap(),
            "http://127.0.0.1:9000"
        );
        assert_eq!(
            resolve_base_url(Some("  "), "https://example.org").unwrap(),
            "https://example.org"
        );
        assert_eq!(resolve_base_url(None, "").unwrap(), Config::DEFAULT_BASE_URL);
        assert!(resolve_base_url(None, "not a url").is_err());
    }

    #[test]
    fn test_endpoints_layout() {
        let endpoints = Endpoints::new("https://lichess.org/");
        assert_eq!(endpoints.token(), "https://lichess.org/api/token");
        assert_eq!(
            endpoints.game_stream("abcd1234"),
            "https://lichess.org/api/board/game/stream/abcd1234"
        );
        assert_eq!(
            endpoints.board_game("abcd"),
            "https://lichess.org/api/board/game/abcd"
        );
    }
}
