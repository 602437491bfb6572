//! Long-lived NDJSON streams with a fixed reconnect policy.
//!
//! Both streams share one loop: GET with bearer auth, read the body line by
//! line, hand each non-empty line to a [`LineHandler`], and on any failure
//! sleep a fixed backoff (long for HTTP 429, short otherwise) before issuing
//! the identical request again. The loop only returns once its
//! [`CancellationToken`] fires.

pub mod account;
pub mod error;
pub mod game;
pub mod lines;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chessdesk_types::AccountEvent;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

pub use self::account::decode_account_event;
pub use self::error::{StreamError, StreamErrorKind};
pub use self::game::{GameStreamDecoder, GameStreamEvent};
pub use self::lines::LineDecoder;
use crate::api::{USER_AGENT, bearer_token};
use crate::config::{Config, Endpoints, StreamConfig};
use crate::token_store::TokenStore;

/// Receives the lines of one stream.
pub trait LineHandler: Send {
    /// Called once per successful connection, before its first line.
    fn on_connected(&mut self) {}

    /// Called for every non-empty line, in order.
    fn on_line(&mut self, line: &str);
}

/// Fixed delays applied before reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub error: Duration,
    pub rate_limited: Duration,
}

impl Backoff {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            error: Duration::from_secs(config.error_backoff_secs),
            rate_limited: Duration::from_secs(config.rate_limit_backoff_secs),
        }
    }

    pub fn delay_for(&self, err: &StreamError) -> Duration {
        match err.kind {
            StreamErrorKind::RateLimited => self.rate_limited,
            _ => self.error,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

/// Builds the client used for streams: no total timeout, only a connect timeout.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn stream_client(config: &StreamConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
        .context("Failed to build streaming HTTP client")
}

/// Opens the account event stream and per-game streams.
#[derive(Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    tokens: Arc<dyn TokenStore>,
    backoff: Backoff,
    idle_timeout: Duration,
}

impl StreamClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config, endpoints: Endpoints, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        Ok(Self {
            http: stream_client(&config.stream)?,
            endpoints,
            tokens,
            backoff: Backoff::from_config(&config.stream),
            idle_timeout: Duration::from_secs(config.stream.idle_timeout_secs),
        })
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Streams account events into `on_event` until `cancel` fires.
    pub async fn open_event_stream<F>(&self, cancel: &CancellationToken, on_event: F)
    where
        F: FnMut(AccountEvent) + Send,
    {
        let mut handler = AccountLines {
            cancel: cancel.clone(),
            on_event,
        };
        self.run(&self.endpoints.event_stream(), "event", cancel, &mut handler)
            .await;
    }

    /// Streams one game into `on_event` until `cancel` fires.
    ///
    /// `decoder` carries the local side; it is reset on every reconnect so the
    /// replayed game object is reported as a snapshot again.
    pub async fn open_game_stream<F>(
        &self,
        game_id: &str,
        decoder: GameStreamDecoder,
        cancel: &CancellationToken,
        on_event: F,
    ) where
        F: FnMut(GameStreamEvent) + Send,
    {
        let mut handler = GameLines {
            cancel: cancel.clone(),
            decoder,
            on_event,
        };
        self.run(&self.endpoints.game_stream(game_id), "game", cancel, &mut handler)
            .await;
    }

    async fn run<H: LineHandler>(
        &self,
        url: &str,
        stream: &'static str,
        cancel: &CancellationToken,
        handler: &mut H,
    ) {
        loop {
            let Some(err) = self.connect_once(url, stream, cancel, handler).await else {
                tracing::debug!(stream, "stream cancelled");
                return;
            };

            let delay = self.backoff.delay_for(&err);
            tracing::warn!(
                stream,
                kind = %err.kind,
                error = %err,
                delay_secs = delay.as_secs_f64(),
                "stream interrupted, reconnecting"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(stream, "stream cancelled during backoff");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connection. Returns `None` when cancelled, otherwise why it ended.
    async fn connect_once<H: LineHandler>(
        &self,
        url: &str,
        stream: &'static str,
        cancel: &CancellationToken,
        handler: &mut H,
    ) -> Option<StreamError> {
        let token = match bearer_token(self.tokens.as_ref()) {
            Ok(token) => token,
            Err(err) => {
                return Some(StreamError::new(
                    StreamErrorKind::Unauthenticated,
                    format!("{err:#}"),
                ));
            }
        };

        let request = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("accept", "application/x-ndjson")
            .send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            response = tokio::time::timeout(self.idle_timeout, request) => response,
        };
        let response = match response {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Some(StreamError::transport(err.to_string())),
            Err(_elapsed) => return Some(StreamError::transport("timed out waiting for headers")),
        };

        let status = response.status();
        if !status.is_success() {
            // The error body is informational; a stalled one must not delay backoff.
            let body = tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                body = tokio::time::timeout(self.idle_timeout, response.text()) => {
                    body.ok().and_then(Result::ok).unwrap_or_default()
                }
            };
            return Some(StreamError::http_status(status.as_u16(), &body));
        }

        tracing::info!(stream, url, "stream connected");
        if cancel.is_cancelled() {
            return None;
        }
        handler.on_connected();

        let mut body = response.bytes_stream();
        let mut lines = LineDecoder::new();
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                chunk = tokio::time::timeout(self.idle_timeout, body.next()) => chunk,
            };

            match chunk {
                Err(_elapsed) => {
                    return Some(StreamError::transport(format!(
                        "no data for {}s",
                        self.idle_timeout.as_secs()
                    )));
                }
                Ok(None) => return Some(StreamError::closed()),
                Ok(Some(Err(err))) => return Some(StreamError::transport(err.to_string())),
                Ok(Some(Ok(bytes))) => lines.push(&bytes),
            }

            while let Some(line) = lines.next_line() {
                if cancel.is_cancelled() {
                    return None;
                }
                if line.trim().is_empty() {
                    tracing::trace!(stream, "keep-alive");
                    continue;
                }
                handler.on_line(&line);
            }
        }
    }
}

struct AccountLines<F> {
    cancel: CancellationToken,
    on_event: F,
}

impl<F> LineHandler for AccountLines<F>
where
    F: FnMut(AccountEvent) + Send,
{
    fn on_line(&mut self, line: &str) {
        match decode_account_event(line) {
            Ok(event) if !self.cancel.is_cancelled() => (self.on_event)(event),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "skipping malformed event line"),
        }
    }
}

struct GameLines<F> {
    cancel: CancellationToken,
    decoder: GameStreamDecoder,
    on_event: F,
}

impl<F> LineHandler for GameLines<F>
where
    F: FnMut(GameStreamEvent) + Send,
{
    fn on_connected(&mut self) {
        self.decoder.reset();
    }

    fn on_line(&mut self, line: &str) {
        match self.decoder.decode_line(line) {
            Ok(events) => {
                for event in events {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    (self.on_event)(event);
                }
            }
            Err(err) => tracing::warn!(error = %err, "skipping malformed game line"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_picks_long_delay_for_rate_limits() {
        let backoff = Backoff::default();
        assert_eq!(
            backoff.delay_for(&StreamError::http_status(429, "")),
            Duration::from_secs(60)
        );
        assert_eq!(
            backoff.delay_for(&StreamError::http_status(500, "")),
            Duration::from_secs(5)
        );
        assert_eq!(backoff.delay_for(&StreamError::closed()), Duration::from_secs(5));
        assert_eq!(
            backoff.delay_for(&StreamError::new(StreamErrorKind::Unauthenticated, "")),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn game_lines_reset_decoder_on_connect() {
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();
        let mut handler = GameLines {
            cancel: cancel.clone(),
            decoder: GameStreamDecoder::new(Some(chessdesk_types::Color::White), None),
            on_event: |event: GameStreamEvent| seen.push(matches!(event, GameStreamEvent::Snapshot(_))),
        };
        let snapshot = r#"{"id":"g","white":{},"black":{},"state":{"moves":""}}"#;

        handler.on_connected();
        handler.on_line(snapshot);
        handler.on_connected();
        handler.on_line(snapshot);
        cancel.cancel();
        handler.on_line(r#"{"type":"gameState","moves":"e2e4"}"#);
        drop(handler);

        assert_eq!(seen, vec![true, true]);
    }
}
