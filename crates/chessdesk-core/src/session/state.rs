//! Session state (pure data, mutated only by the reducer).
//!
//! ```text
//! SessionState
//! ├── app_state: Authorization | Home | Game
//! ├── username: fetched on every entry into Home
//! ├── auth_scope / event_scope / seek_scope: live background scopes
//! ├── game: ActiveGame (id, scope, colour, snapshot, finished)
//! └── scopes: ScopeSeq (scope id generator)
//! ```

use std::fmt;

use chessdesk_types::{Color, GameSnapshot, GameUpdate};

/// Which screen the app is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppState {
    #[default]
    Authorization,
    Home,
    Game,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppState::Authorization => write!(f, "authorization"),
            AppState::Home => write!(f, "home"),
            AppState::Game => write!(f, "game"),
        }
    }
}

/// Identifies one cancellable background scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u64);

#[derive(Debug, Default)]
pub struct ScopeSeq {
    next: u64,
}

impl ScopeSeq {
    pub fn next_id(&mut self) -> ScopeId {
        let id = ScopeId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// The game whose stream is (or was) open.
#[derive(Debug, Clone)]
pub struct ActiveGame {
    /// Id the game stream was opened for.
    pub id: String,
    pub scope: ScopeId,
    /// Local side, once known.
    pub color: Option<Color>,
    pub snapshot: Option<GameSnapshot>,
    pub last_update: Option<GameUpdate>,
    /// Set once the game ended; the stream scope is already cancelled.
    pub finished: bool,
}

impl ActiveGame {
    pub fn new(id: String, scope: ScopeId, color: Option<Color>) -> Self {
        Self {
            id,
            scope,
            color,
            snapshot: None,
            last_update: None,
            finished: false,
        }
    }

    /// Latest authoritative state: the last update, else the snapshot's.
    pub fn current(&self) -> Option<&GameUpdate> {
        self.last_update
            .as_ref()
            .or_else(|| self.snapshot.as_ref().map(|s| &s.state))
    }

    pub fn is_playing(&self) -> bool {
        self.snapshot.is_some() && !self.finished
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub app_state: AppState,
    pub username: Option<String>,
    pub auth_scope: Option<ScopeId>,
    pub event_scope: Option<ScopeId>,
    pub seek_scope: Option<ScopeId>,
    pub game: Option<ActiveGame>,
    pub scopes: ScopeSeq,
    pub disposed: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth_in_flight(&self) -> bool {
        self.auth_scope.is_some()
    }

    /// Every scope that may still own background work.
    pub fn live_scopes(&self) -> Vec<ScopeId> {
        let game_scope = self
            .game
            .as_ref()
            .filter(|g| !g.finished)
            .map(|g| g.scope);
        [self.auth_scope, self.event_scope, self.seek_scope, game_scope]
            .into_iter()
            .flatten()
            .collect()
    }
}
