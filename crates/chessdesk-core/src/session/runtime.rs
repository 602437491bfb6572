//! Session runtime: owns the state, executes reducer effects and routes
//! background results back through one inbox.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chessdesk_types::SeekRequest;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::effects::SessionEffect;
use super::events::{SessionEvent, SessionInput};
use super::state::{ScopeId, SessionState};
use super::update;
use crate::api::{BoardApi, request_client};
use crate::auth::{AuthFlow, BrowserOpener};
use crate::clock::GameClock;
use crate::config::Config;
use crate::stream::{GameStreamDecoder, StreamClient};
use crate::token_store::TokenStore;

/// Collaborators the session drives.
pub struct SessionDeps {
    pub streams: StreamClient,
    pub api: BoardApi,
    pub auth: Arc<AuthFlow>,
    pub tokens: Arc<dyn TokenStore>,
}

impl SessionDeps {
    /// Wires the production collaborators from `config`.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or an HTTP client cannot be built.
    pub fn from_config(
        config: &Config,
        tokens: Arc<dyn TokenStore>,
        browser: BrowserOpener,
    ) -> Result<Self> {
        let endpoints = config.endpoints()?;
        let http = request_client(config)?;
        Ok(Self {
            streams: StreamClient::new(config, endpoints.clone(), Arc::clone(&tokens))?,
            api: BoardApi::new(http.clone(), endpoints.clone(), Arc::clone(&tokens)),
            auth: Arc::new(AuthFlow::new(
                http,
                endpoints,
                config.auth.clone(),
                Arc::clone(&tokens),
                browser,
            )),
            tokens,
        })
    }
}

/// Cloneable command surface for the presenter.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl SessionHandle {
    fn send(&self, input: SessionInput) {
        if self.tx.send(input).is_err() {
            tracing::debug!("session already stopped");
        }
    }

    pub fn start_authentication(&self) {
        self.send(SessionInput::StartAuthentication);
    }

    pub fn return_to_home(&self) {
        self.send(SessionInput::ReturnToHome);
    }

    pub fn make_move(&self, uci: &str) {
        self.send(SessionInput::MakeMove(uci.to_string()));
    }

    pub fn offer_draw(&self) {
        self.send(SessionInput::OfferDraw);
    }

    pub fn respond_to_draw(&self, accept: bool) {
        self.send(SessionInput::RespondToDraw { accept });
    }

    pub fn resign(&self) {
        self.send(SessionInput::Resign);
    }

    pub fn seek(&self, request: SeekRequest) {
        self.send(SessionInput::Seek(request));
    }

    pub fn cancel_seek(&self) {
        self.send(SessionInput::CancelSeek);
    }

    pub fn logout(&self) {
        self.send(SessionInput::Logout);
    }

    /// Cancels every background scope and stops the controller. Safe to repeat.
    pub fn dispose(&self) {
        self.send(SessionInput::Dispose);
    }
}

/// The single owner of session state and background work.
pub struct SessionController {
    state: SessionState,
    inbox_tx: mpsc::UnboundedSender<SessionInput>,
    inbox_rx: mpsc::UnboundedReceiver<SessionInput>,
    events: mpsc::UnboundedSender<SessionEvent>,
    scopes: HashMap<ScopeId, CancellationToken>,
    clock: GameClock,
    deps: SessionDeps,
}

impl SessionController {
    /// Returns the controller, a handle for commands and the presenter's
    /// notification receiver. Dropping the receiver unsubscribes.
    pub fn new(
        deps: SessionDeps,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let clock_events = events.clone();
        let clock = GameClock::new(move |display| {
            let _ = clock_events.send(SessionEvent::Clock(display));
        });

        let handle = SessionHandle {
            tx: inbox_tx.clone(),
        };
        let controller = Self {
            state: SessionState::new(),
            inbox_tx,
            inbox_rx,
            events,
            scopes: HashMap::new(),
            clock,
            deps,
        };
        (controller, handle, events_rx)
    }

    /// Runs until [`SessionHandle::dispose`] is processed.
    pub async fn run(mut self) {
        let has_token = self.deps.tokens.has_token();
        let effects = update::start(&mut self.state, has_token);
        self.execute_effects(effects);

        while let Some(input) = self.inbox_rx.recv().await {
            let effects = update::update(&mut self.state, input);
            self.execute_effects(effects);
            if self.state.disposed {
                break;
            }
        }

        for (_, token) in self.scopes.drain() {
            token.cancel();
        }
        self.clock.dispose();
        tracing::debug!("session stopped");
    }

    fn execute_effects(&mut self, effects: Vec<SessionEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn open_scope(&mut self, scope: ScopeId) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.scopes.insert(scope, token.clone()) {
            previous.cancel();
        }
        token
    }

    fn execute_effect(&mut self, effect: SessionEffect) {
        match effect {
            SessionEffect::Notify(event) => {
                // A dropped receiver means the presenter unsubscribed.
                let _ = self.events.send(event);
            }
            SessionEffect::CancelScope(scope) => {
                if let Some(token) = self.scopes.remove(&scope) {
                    token.cancel();
                }
            }
            SessionEffect::StartAuthentication { scope } => {
                let cancel = self.open_scope(scope);
                let auth = Arc::clone(&self.deps.auth);
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        () = cancel.cancelled() => {}
                        result = auth.start_authentication() => {
                            let _ = tx.send(SessionInput::AuthCompleted { scope, result });
                        }
                    }
                });
            }
            SessionEffect::OpenEventStream { scope } => {
                let cancel = self.open_scope(scope);
                let streams = self.deps.streams.clone();
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    streams
                        .open_event_stream(&cancel, |event| {
                            let _ = tx.send(SessionInput::Account { scope, event });
                        })
                        .await;
                });
            }
            SessionEffect::FetchProfile { scope } => {
                let Some(cancel) = self.scopes.get(&scope).cloned() else {
                    return;
                };
                let api = self.deps.api.clone();
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let username = tokio::select! {
                        () = cancel.cancelled() => return,
                        profile = api.account() => match profile {
                            Ok(profile) => Some(profile.username),
                            Err(err) => {
                                tracing::warn!(error = %format!("{err:#}"), "failed to load profile");
                                None
                            }
                        },
                    };
                    let _ = tx.send(SessionInput::ProfileLoaded { scope, username });
                });
            }
            SessionEffect::OpenGameStream {
                scope,
                game_id,
                color,
                username,
            } => {
                let cancel = self.open_scope(scope);
                let streams = self.deps.streams.clone();
                let tx = self.inbox_tx.clone();
                let decoder = GameStreamDecoder::new(color, username);
                tokio::spawn(async move {
                    streams
                        .open_game_stream(&game_id, decoder, &cancel, |event| {
                            let _ = tx.send(SessionInput::Game { scope, event });
                        })
                        .await;
                });
            }
            SessionEffect::Seek { scope, request } => {
                let cancel = self.open_scope(scope);
                let api = self.deps.api.clone();
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let paired = api.seek(&request, &cancel).await;
                    let _ = tx.send(SessionInput::SeekCompleted { scope, paired });
                });
            }
            SessionEffect::PostAction { game_id, action } => {
                let api = self.deps.api.clone();
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let ok = api.perform(&game_id, &action).await;
                    let _ = tx.send(SessionInput::ActionCompleted { action, ok });
                });
            }
            SessionEffect::SyncClock {
                white_ms,
                black_ms,
                is_playing_white,
                is_player_turn,
            } => {
                self.clock
                    .sync_with_server_time(white_ms, black_ms, is_playing_white, is_player_turn);
            }
            SessionEffect::StopClock => self.clock.stop(),
            SessionEffect::ResetClock => self.clock.reset(),
            SessionEffect::DisposeClock => self.clock.dispose(),
            SessionEffect::ClearToken => {
                if let Err(err) = self.deps.tokens.clear() {
                    tracing::warn!(error = %format!("{err:#}"), "failed to clear stored token");
                }
            }
        }
    }
}
