//! PKCE authorization-code flow with a local redirect listener.
//!
//! One attempt: generate a verifier/challenge pair and a `state` nonce, bind
//! the registered redirect URI locally, send the user to the authorization
//! page, wait for a single redirect carrying `code` and the same `state`,
//! exchange the code for an access token and store it. Every failure collapses into [`AuthResult::failure`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chessdesk_types::TokenResponse;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{AuthConfig, Endpoints};
use crate::token_store::TokenStore;

/// Suppresses opening the system browser (the URL is still reported).
pub const NO_BROWSER_ENV: &str = "CHESSDESK_NO_BROWSER";

/// Upper bound on the redirect request head we are willing to read.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub success: bool,
    pub token: Option<String>,
}

impl AuthResult {
    pub fn success(token: String) -> Self {
        Self {
            success: true,
            token: Some(token),
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            token: None,
        }
    }
}

/// PKCE code verifier and challenge for a single attempt. Never persisted.
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

/// Generates a PKCE verifier (48 random bytes, base64url) and its S256 challenge.
pub fn generate_pkce() -> Pkce {
    let mut verifier_bytes = [0u8; 48];
    for chunk in verifier_bytes.chunks_mut(16) {
        chunk.copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    }
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);
    let challenge = challenge_for(&verifier);

    Pkce {
        verifier,
        challenge,
    }
}

fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Random value echoed back by the server on the redirect.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Builds the browser-facing authorization URL.
pub fn build_auth_url(endpoints: &Endpoints, config: &AuthConfig, pkce: &Pkce, state: &str) -> String {
    let params = [
        ("response_type", "code"),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("code_challenge_method", "S256"),
        ("code_challenge", pkce.challenge.as_str()),
        ("scope", config.scopes.as_str()),
        ("state", state),
    ];

    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();

    format!("{}?{query}", endpoints.authorization())
}

/// Query parameters the server sends back to the redirect URI.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

/// Parses the request line of the redirect and extracts `code`, `error` and `state`.
///
/// Returns `None` if the request is malformed or targets another path.
pub fn extract_callback(request: &str, callback_path: &str) -> Option<CallbackParams> {
    let request_line = request.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;

    let url = url::Url::parse(&format!("http://localhost{target}")).ok()?;
    if url.path().trim_end_matches('/') != callback_path.trim_end_matches('/') {
        return None;
    }

    let find = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.is_empty())
    };
    Some(CallbackParams {
        code: find("code"),
        error: find("error"),
        state: find("state"),
    })
}

fn oauth_success_response() -> String {
    let body = "<html><body><h3>Login complete</h3><p>You can return to the app.</p></body></html>";
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn oauth_error_response() -> String {
    let body = "<html><body><h3>Login failed</h3><p>Return to the app and try again.</p></body></html>";
    format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

/// Local listener bound to the registered redirect URI.
///
/// Dropping it closes the socket, so every exit path releases the port.
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Binds the host and port of `redirect_uri`. `localhost` binds the IPv4 loopback.
    ///
    /// # Errors
    /// Returns an error if the URI is invalid or the address is unavailable.
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = url::Url::parse(redirect_uri)
            .with_context(|| format!("Invalid redirect URI: {redirect_uri}"))?;
        let host = match url.host_str() {
            Some("localhost") | None => "127.0.0.1",
            Some(host) => host.trim_start_matches('[').trim_end_matches(']'),
        };
        let port = url
            .port_or_known_default()
            .context("Redirect URI has no port")?;

        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind redirect listener on {host}:{port}"))?;

        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    /// # Errors
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Accepts exactly one request, answers it and returns the callback parameters.
    ///
    /// # Errors
    /// Returns an error on socket failures or a request for another path.
    pub async fn wait_for_callback(self) -> Result<CallbackParams> {
        let (mut stream, peer) = self
            .listener
            .accept()
            .await
            .context("Failed to accept redirect connection")?;
        tracing::debug!(%peer, "redirect connection accepted");

        let mut head = Vec::with_capacity(1024);
        let mut buffer = [0u8; 1024];
        while head.len() < MAX_REQUEST_HEAD {
            let read = stream
                .read(&mut buffer)
                .await
                .context("Failed to read redirect request")?;
            if read == 0 {
                break;
            }
            head.extend_from_slice(&buffer[..read]);
            if head.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let request = String::from_utf8_lossy(&head);
        let params = extract_callback(&request, &self.path);
        let response = match params.as_ref() {
            Some(p) if p.code.is_some() => oauth_success_response(),
            _ => oauth_error_response(),
        };
        stream
            .write_all(response.as_bytes())
            .await
            .context("Failed to answer redirect request")?;
        let _ = stream.shutdown().await;

        params.context("Redirect request did not target the callback path")
    }
}

/// Exchanges an authorization code for an access token.
///
/// # Errors
/// Returns an error on transport failures, non-2xx responses or malformed bodies.
pub async fn exchange_code(
    http: &reqwest::Client,
    endpoints: &Endpoints,
    config: &AuthConfig,
    code: &str,
    pkce: &Pkce,
) -> Result<TokenResponse> {
    let response = http
        .post(endpoints.token())
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", pkce.verifier.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
        ])
        .send()
        .await
        .context("Failed to send token exchange request")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Token exchange failed (HTTP {status}): {body}");
    }

    let token: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;
    if token.access_token.trim().is_empty() {
        anyhow::bail!("Token response carried an empty access token");
    }
    Ok(token)
}

/// Receives the authorization URL; expected to send the user there.
pub type BrowserOpener = Arc<dyn Fn(&str) + Send + Sync>;

/// Opens `url` with the system handler unless `CHESSDESK_NO_BROWSER` is set.
pub fn system_browser() -> BrowserOpener {
    Arc::new(|url: &str| {
        if std::env::var_os(NO_BROWSER_ENV).is_some() {
            return;
        }
        if let Err(err) = open::that(url) {
            tracing::warn!(error = %err, "failed to open browser");
        }
    })
}

/// Runs authentication attempts. A new attempt cancels the one in flight.
pub struct AuthFlow {
    http: reqwest::Client,
    endpoints: Endpoints,
    config: AuthConfig,
    tokens: Arc<dyn TokenStore>,
    browser: BrowserOpener,
    attempt: Mutex<Option<(u64, CancellationToken)>>,
    attempt_seq: AtomicU64,
}

impl AuthFlow {
    pub fn new(
        http: reqwest::Client,
        endpoints: Endpoints,
        config: AuthConfig,
        tokens: Arc<dyn TokenStore>,
        browser: BrowserOpener,
    ) -> Self {
        Self {
            http,
            endpoints,
            config,
            tokens,
            browser,
            attempt: Mutex::new(None),
            attempt_seq: AtomicU64::new(0),
        }
    }

    /// Runs one attempt to completion. Never fails: errors become [`AuthResult::failure`].
    pub async fn start_authentication(&self) -> AuthResult {
        let id = self.attempt_seq.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        if let Some((_, previous)) = self
            .attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace((id, cancel.clone()))
        {
            previous.cancel();
        }

        let result = match self.run(&cancel).await {
            Ok(token) => AuthResult::success(token),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "authentication failed");
                AuthResult::failure()
            }
        };

        let mut slot = self.attempt.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
        }
        result
    }

    /// Cancels the attempt in flight, if any.
    pub fn cancel(&self) {
        if let Some((_, current)) = self
            .attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            current.cancel();
        }
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<String> {
        let pkce = generate_pkce();
        let state = generate_state();
        let auth_url = build_auth_url(&self.endpoints, &self.config, &pkce, &state);

        let listener = CallbackListener::bind(&self.config.redirect_uri).await?;
        tracing::info!(redirect_uri = %self.config.redirect_uri, "waiting for OAuth redirect");
        (self.browser)(&auth_url);

        let params = wait_or_cancel(
            cancel,
            self.config.callback_timeout(),
            listener.wait_for_callback(),
        )
        .await?;

        if let Some(error) = params.error {
            anyhow::bail!("Authorization was denied: {error}");
        }
        if params.state.as_deref() != Some(state.as_str()) {
            anyhow::bail!("Redirect state does not match this attempt");
        }
        let code = params
            .code
            .context("Redirect did not carry an authorization code")?;

        let token = wait_or_cancel(
            cancel,
            self.config.callback_timeout(),
            exchange_code(&self.http, &self.endpoints, &self.config, &code, &pkce),
        )
        .await?;
        tracing::info!(
            token_type = %token.token_type,
            expires_in = ?token.expires_in,
            "access token obtained"
        );

        self.tokens
            .set_token(&token.access_token)
            .context("Failed to store access token")?;
        Ok(token.access_token)
    }
}

async fn wait_or_cancel<T>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        () = cancel.cancelled() => anyhow::bail!("Authentication attempt was cancelled"),
        outcome = tokio::time::timeout(limit, fut) => {
            outcome.map_err(|_elapsed| anyhow::anyhow!("Timed out after {}s", limit.as_secs()))?
        }
    }
}
