//! Session reducer.
//!
//! All state transitions live here. The runtime calls [`update`] with each
//! input and executes the returned effects; nothing here performs I/O.

use chessdesk_types::{AccountEvent, Color, GameInfo, GameStatus, GameUpdate};

use super::effects::SessionEffect;
use super::events::{SessionEvent, SessionInput};
use super::state::{ActiveGame, AppState, ScopeId, SessionState};
use crate::api::BoardAction;
use crate::stream::GameStreamEvent;

/// Initial transition: `Home` if a token is already stored, else `Authorization`.
pub fn start(state: &mut SessionState, has_token: bool) -> Vec<SessionEffect> {
    let mut effects = Vec::new();
    if has_token {
        enter_home(state, &mut effects);
    } else {
        set_app_state(state, AppState::Authorization, &mut effects);
        // Observers always learn the initial state.
        if effects.is_empty() {
            effects.push(SessionEffect::Notify(SessionEvent::StateChanged(
                AppState::Authorization,
            )));
        }
    }
    effects
}

pub fn update(state: &mut SessionState, input: SessionInput) -> Vec<SessionEffect> {
    if state.disposed {
        return vec![];
    }

    let mut effects = Vec::new();
    match input {
        SessionInput::StartAuthentication => start_authentication(state, &mut effects),
        SessionInput::AuthCompleted { scope, result } => {
            if state.auth_scope != Some(scope) {
                tracing::debug!(?scope, "dropping stale auth result");
                return effects;
            }
            state.auth_scope = None;
            effects.push(SessionEffect::Notify(SessionEvent::AuthenticationFinished {
                success: result.success,
            }));
            if result.success {
                enter_home(state, &mut effects);
            } else {
                set_app_state(state, AppState::Authorization, &mut effects);
            }
        }
        SessionInput::ProfileLoaded { scope, username } => {
            if state.event_scope != Some(scope) {
                return effects;
            }
            if let Some(username) = username {
                state.username = Some(username.clone());
                effects.push(SessionEffect::Notify(SessionEvent::ProfileLoaded {
                    username,
                }));
            }
        }
        SessionInput::Account { scope, event } => {
            if state.event_scope != Some(scope) {
                tracing::debug!(?scope, "dropping event from stale stream");
                return effects;
            }
            handle_account_event(state, event, &mut effects);
        }
        SessionInput::Game { scope, event } => {
            let live = state
                .game
                .as_ref()
                .is_some_and(|g| g.scope == scope && !g.finished);
            if !live {
                tracing::debug!(?scope, "dropping event from stale game stream");
                return effects;
            }
            handle_game_event(state, event, &mut effects);
        }
        SessionInput::ReturnToHome => return_to_home(state, &mut effects),
        SessionInput::MakeMove(uci) => {
            board_action(state, BoardAction::Move { uci }, &mut effects);
        }
        SessionInput::OfferDraw => {
            board_action(state, BoardAction::Draw { accept: true }, &mut effects);
        }
        SessionInput::RespondToDraw { accept } => {
            board_action(state, BoardAction::Draw { accept }, &mut effects);
        }
        SessionInput::Resign => board_action(state, BoardAction::Resign, &mut effects),
        SessionInput::ActionCompleted { action, ok } => {
            effects.push(SessionEffect::Notify(SessionEvent::ActionResult { action, ok }));
        }
        SessionInput::Seek(request) => {
            if state.app_state != AppState::Home || state.game.is_some() {
                tracing::warn!(state = %state.app_state, "seek ignored outside the home screen");
                effects.push(SessionEffect::Notify(SessionEvent::SeekFinished {
                    paired: false,
                }));
                return effects;
            }
            if let Some(previous) = state.seek_scope.take() {
                effects.push(SessionEffect::CancelScope(previous));
            }
            let scope = state.scopes.next_id();
            state.seek_scope = Some(scope);
            effects.push(SessionEffect::Seek { scope, request });
        }
        SessionInput::CancelSeek => {
            if let Some(scope) = state.seek_scope.take() {
                effects.push(SessionEffect::CancelScope(scope));
                effects.push(SessionEffect::Notify(SessionEvent::SeekFinished {
                    paired: false,
                }));
            }
        }
        SessionInput::SeekCompleted { scope, paired } => {
            if state.seek_scope != Some(scope) {
                return effects;
            }
            state.seek_scope = None;
            effects.push(SessionEffect::Notify(SessionEvent::SeekFinished { paired }));
        }
        SessionInput::Logout => {
            cancel_all(state, &mut effects);
            state.game = None;
            state.username = None;
            effects.push(SessionEffect::ResetClock);
            effects.push(SessionEffect::ClearToken);
            set_app_state(state, AppState::Authorization, &mut effects);
        }
        SessionInput::Dispose => {
            cancel_all(state, &mut effects);
            effects.push(SessionEffect::DisposeClock);
            state.disposed = true;
        }
    }
    effects
}

fn set_app_state(state: &mut SessionState, next: AppState, effects: &mut Vec<SessionEffect>) {
    if state.app_state != next {
        tracing::info!(from = %state.app_state, to = %next, "session state changed");
        state.app_state = next;
        effects.push(SessionEffect::Notify(SessionEvent::StateChanged(next)));
    }
}

/// Every entry into `Home` replaces the event stream with a fresh scope.
fn enter_home(state: &mut SessionState, effects: &mut Vec<SessionEffect>) {
    if let Some(previous) = state.event_scope.take() {
        effects.push(SessionEffect::CancelScope(previous));
    }
    let scope = state.scopes.next_id();
    state.event_scope = Some(scope);
    effects.push(SessionEffect::OpenEventStream { scope });
    effects.push(SessionEffect::FetchProfile { scope });
    set_app_state(state, AppState::Home, effects);
}

fn cancel_all(state: &mut SessionState, effects: &mut Vec<SessionEffect>) {
    for scope in state.live_scopes() {
        effects.push(SessionEffect::CancelScope(scope));
    }
    state.auth_scope = None;
    state.event_scope = None;
    state.seek_scope = None;
    if let Some(game) = state.game.as_mut() {
        game.finished = true;
    }
}

fn start_authentication(state: &mut SessionState, effects: &mut Vec<SessionEffect>) {
    if state.app_state != AppState::Authorization {
        tracing::warn!(state = %state.app_state, "already authenticated");
        return;
    }
    if let Some(previous) = state.auth_scope.take() {
        effects.push(SessionEffect::CancelScope(previous));
    }
    let scope = state.scopes.next_id();
    state.auth_scope = Some(scope);
    effects.push(SessionEffect::StartAuthentication { scope });
}

fn handle_account_event(
    state: &mut SessionState,
    event: AccountEvent,
    effects: &mut Vec<SessionEffect>,
) {
    match event {
        AccountEvent::GameStart { game } => game_start(state, &game, effects),
        AccountEvent::GameFinish { game } => {
            let active = state
                .game
                .as_ref()
                .is_some_and(|active| !active.finished && game.refers_to(&active.id));
            if active {
                finish_game(state, None, None, effects);
            } else {
                tracing::debug!(game_id = %game.game_id, "gameFinish for an inactive game");
            }
        }
        AccountEvent::Challenge { challenge } => {
            effects.push(SessionEffect::Notify(SessionEvent::ChallengeReceived(
                challenge,
            )));
        }
        AccountEvent::ChallengeCanceled { challenge } => {
            effects.push(SessionEffect::Notify(SessionEvent::ChallengeCanceled {
                id: challenge.id,
            }));
        }
        AccountEvent::Other => tracing::debug!("ignoring unhandled account event"),
    }
}

fn game_start(state: &mut SessionState, game: &GameInfo, effects: &mut Vec<SessionEffect>) {
    let game_id = game.stream_id().to_string();
    if game_id.is_empty() {
        tracing::warn!("gameStart without a game id");
        return;
    }

    if let Some(active) = &state.game {
        if game.refers_to(&active.id) {
            tracing::debug!(%game_id, "gameStart for the active game");
            return;
        }
        if active.is_playing() {
            tracing::warn!(%game_id, active = %active.id, "gameStart while another game is active");
            return;
        }
    }

    // A previous game stream is always cancelled before a new one opens,
    // including one still waiting for its snapshot.
    if let Some(previous) = state.game.take()
        && !previous.finished
    {
        effects.push(SessionEffect::CancelScope(previous.scope));
    }
    effects.push(SessionEffect::ResetClock);

    let scope = state.scopes.next_id();
    tracing::info!(%game_id, "opening game stream");
    state.game = Some(ActiveGame::new(game_id.clone(), scope, game.color));
    effects.push(SessionEffect::OpenGameStream {
        scope,
        game_id,
        color: game.color,
        username: state.username.clone(),
    });
}

fn handle_game_event(
    state: &mut SessionState,
    event: GameStreamEvent,
    effects: &mut Vec<SessionEffect>,
) {
    let username = state.username.clone();
    let Some(game) = state.game.as_mut() else {
        return;
    };

    match event {
        GameStreamEvent::Snapshot(snapshot) => {
            if game.color.is_none() {
                game.color = username.as_deref().and_then(|name| snapshot.color_of(name));
            }
            let sync = clock_sync(&snapshot.state, game.color);
            let replay = game.snapshot.is_some();
            game.last_update = None;
            game.snapshot = Some(snapshot.clone());

            if replay {
                effects.push(SessionEffect::Notify(SessionEvent::BoardUpdated(
                    snapshot.state,
                )));
            } else {
                let color = game.color;
                set_app_state(state, AppState::Game, effects);
                effects.push(SessionEffect::Notify(SessionEvent::GameStarted {
                    snapshot,
                    color,
                }));
            }
            effects.push(sync);
        }
        GameStreamEvent::Update(update) => {
            let sync = clock_sync(&update, game.color);
            game.last_update = Some(update.clone());
            effects.push(SessionEffect::Notify(SessionEvent::BoardUpdated(update)));
            effects.push(sync);
        }
        GameStreamEvent::DrawOffered(_) => {
            effects.push(SessionEffect::Notify(SessionEvent::DrawOffered));
        }
        GameStreamEvent::GameOver(update) => {
            finish_game(state, Some(update.status), update.winner, effects);
        }
    }
}

/// Clock sync for `update` as seen by `color`. An unknown side is treated as white.
fn clock_sync(update: &GameUpdate, color: Option<Color>) -> SessionEffect {
    let is_playing_white = color != Some(Color::Black);
    let white_to_move = update.move_count() % 2 == 0;
    SessionEffect::SyncClock {
        white_ms: update.wtime,
        black_ms: update.btime,
        is_playing_white,
        is_player_turn: white_to_move == is_playing_white,
    }
}

/// Ends the active game: cancels its stream, stops the clock, keeps the screen.
fn finish_game(
    state: &mut SessionState,
    status: Option<GameStatus>,
    winner: Option<Color>,
    effects: &mut Vec<SessionEffect>,
) {
    let Some(game) = state.game.as_mut() else {
        return;
    };
    if game.finished {
        return;
    }
    game.finished = true;
    tracing::info!(game_id = %game.id, ?status, "game over");
    effects.push(SessionEffect::CancelScope(game.scope));
    effects.push(SessionEffect::StopClock);
    effects.push(SessionEffect::Notify(SessionEvent::GameOver {
        game_id: game.id.clone(),
        status,
        winner,
    }));
}

fn return_to_home(state: &mut SessionState, effects: &mut Vec<SessionEffect>) {
    if state.app_state == AppState::Authorization {
        return;
    }
    match state.game.as_ref().map(|g| (g.snapshot.is_some(), g.scope)) {
        Some((true, _)) => finish_game(state, None, None, effects),
        // Never shown as started: drop the stream without a game-over notice.
        Some((false, scope)) => effects.push(SessionEffect::CancelScope(scope)),
        None => {}
    }
    if state.game.take().is_some() {
        effects.push(SessionEffect::ResetClock);
    }
    if state.app_state != AppState::Home {
        enter_home(state, effects);
    }
}

fn board_action(state: &SessionState, action: BoardAction, effects: &mut Vec<SessionEffect>) {
    match state.game.as_ref().filter(|g| g.is_playing()) {
        Some(game) => effects.push(SessionEffect::PostAction {
            game_id: game.id.clone(),
            action,
        }),
        None => {
            tracing::warn!(?action, "no game in progress");
            effects.push(SessionEffect::Notify(SessionEvent::ActionResult {
                action,
                ok: false,
            }));
        }
    }
}
