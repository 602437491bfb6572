//! One-shot bearer-authenticated calls: account lookups, seeks and board actions.
//!
//! Board actions are fire-and-forget: they report success as a `bool` and the
//! authoritative effect arrives through the game stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chessdesk_types::{ActiveGames, GameInfo, Profile, SeekRequest};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Endpoints};
use crate::token_store::TokenStore;

/// Standard User-Agent header for chessdesk requests.
pub const USER_AGENT: &str = concat!("chessdesk/", env!("CARGO_PKG_VERSION"));

/// Builds the client used for one-shot requests.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn request_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.http.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Reads the bearer token, failing if nobody is logged in.
pub(crate) fn bearer_token(tokens: &dyn TokenStore) -> Result<String> {
    tokens
        .get_token()
        .context("Failed to read access token")?
        .context("Not logged in")
}

/// A board action on the active game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardAction {
    Move { uci: String },
    /// Offer a draw, or accept the opponent's offer.
    Draw { accept: bool },
    Resign,
}

impl BoardAction {
    fn path_suffix(&self) -> String {
        match self {
            BoardAction::Move { uci } => format!("move/{uci}"),
            BoardAction::Draw { accept: true } => "draw/yes".to_string(),
            BoardAction::Draw { accept: false } => "draw/no".to_string(),
            BoardAction::Resign => "resign".to_string(),
        }
    }
}

/// Client for the server's REST endpoints.
#[derive(Clone)]
pub struct BoardApi {
    http: reqwest::Client,
    endpoints: Endpoints,
    tokens: Arc<dyn TokenStore>,
}

impl BoardApi {
    pub fn new(http: reqwest::Client, endpoints: Endpoints, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            http,
            endpoints,
            tokens,
        }
    }

    /// Fetches the logged-in account.
    ///
    /// # Errors
    /// Returns an error if not logged in, on transport failures or non-2xx responses.
    pub async fn account(&self) -> Result<Profile> {
        let token = bearer_token(self.tokens.as_ref())?;
        let response = self
            .http
            .get(self.endpoints.account())
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to request account")?;

        match response.status() {
            StatusCode::UNAUTHORIZED => anyhow::bail!("Token invalid or expired; log in again"),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Account request failed (HTTP {status}): {body}");
            }
            _ => response.json().await.context("Failed to parse account"),
        }
    }

    /// Lists games the account is currently playing.
    ///
    /// # Errors
    /// Returns an error if not logged in, on transport failures or non-2xx responses.
    pub async fn ongoing_games(&self) -> Result<Vec<GameInfo>> {
        let token = bearer_token(self.tokens.as_ref())?;
        let response = self
            .http
            .get(self.endpoints.playing())
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to request ongoing games")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ongoing games request failed (HTTP {status}): {body}");
        }

        let games: ActiveGames = response
            .json()
            .await
            .context("Failed to parse ongoing games")?;
        Ok(games.now_playing)
    }

    /// Posts a seek and waits until the server pairs it or `cancel` fires.
    ///
    /// The pairing itself is announced on the account event stream.
    pub async fn seek(&self, request: &SeekRequest, cancel: &CancellationToken) -> bool {
        let token = match bearer_token(self.tokens.as_ref()) {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(error = %err, "seek skipped");
                return false;
            }
        };

        let send = self
            .http
            .post(self.endpoints.seek())
            .bearer_auth(token)
            .header("accept", "application/json")
            .json(request)
            .send();

        let response = tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("seek cancelled");
                return false;
            }
            response = send => response,
        };

        match response {
            Ok(response) if response.status().is_success() => {
                tracing::info!(minutes = request.time, increment = request.increment, "seek paired");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(%status, body = %body, "seek rejected");
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "seek request failed");
                false
            }
        }
    }

    /// Performs a board action on `game_id`.
    pub async fn perform(&self, game_id: &str, action: &BoardAction) -> bool {
        let token = match bearer_token(self.tokens.as_ref()) {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(error = %err, ?action, "board action skipped");
                return false;
            }
        };

        let url = format!(
            "{}/{}",
            self.endpoints.board_game(game_id),
            action.path_suffix()
        );
        match self.http.post(&url).bearer_auth(token).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(game_id, ?action, "board action accepted");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(game_id, ?action, %status, body = %body, "board action rejected");
                false
            }
            Err(err) => {
                tracing::warn!(game_id, ?action, error = %err, "board action failed");
                false
            }
        }
    }

    pub async fn make_move(&self, game_id: &str, uci: &str) -> bool {
        self.perform(
            game_id,
            &BoardAction::Move {
                uci: uci.to_string(),
            },
        )
        .await
    }

    pub async fn handle_draw_offer(&self, game_id: &str, accept: bool) -> bool {
        self.perform(game_id, &BoardAction::Draw { accept }).await
    }

    pub async fn resign(&self, game_id: &str) -> bool {
        self.perform(game_id, &BoardAction::Resign).await
    }
}
