//! CLI command handlers.

use std::sync::Arc;

use anyhow::Result;
use chessdesk_core::BoardApi;
use chessdesk_core::api::request_client;
use chessdesk_core::auth::{BrowserOpener, system_browser};
use chessdesk_core::config::Config;
use chessdesk_core::token_store::{EnvTokenStore, TokenStore, open_token_store};

pub mod auth;
pub mod config;
pub mod games;
pub mod play;

/// The configured token store, shadowed by `CHESSDESK_TOKEN` when set.
fn token_store(config: &Config) -> Arc<dyn TokenStore> {
    env_token_store(config)
}

fn env_token_store(config: &Config) -> Arc<EnvTokenStore> {
    Arc::new(EnvTokenStore::from_env(open_token_store(
        config.auth.token_store,
    )))
}

fn board_api(config: &Config, tokens: Arc<dyn TokenStore>) -> Result<BoardApi> {
    Ok(BoardApi::new(request_client(config)?, config.endpoints()?, tokens))
}

/// Prints the authorization URL before handing it to the system browser,
/// so it can be opened by hand when no browser is available.
fn announcing_browser() -> BrowserOpener {
    let open = system_browser();
    Arc::new(move |url: &str| {
        eprintln!("Opening the login page. If no browser appears, visit:\n  {url}");
        open(url);
    })
}
