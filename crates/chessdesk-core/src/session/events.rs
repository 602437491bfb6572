//! Inputs to the session reducer and notifications to the presenter.

use chessdesk_types::{
    AccountEvent, ChallengeInfo, Color, GameSnapshot, GameStatus, GameUpdate, SeekRequest,
};

use super::state::{AppState, ScopeId};
use crate::api::BoardAction;
use crate::auth::AuthResult;
use crate::clock::ClockDisplay;
use crate::stream::GameStreamEvent;

/// Everything the reducer reacts to: user commands and background results.
///
/// Results carry the scope they were produced under; the reducer drops
/// results whose scope is no longer live.
#[derive(Debug)]
pub enum SessionInput {
    StartAuthentication,
    ReturnToHome,
    MakeMove(String),
    OfferDraw,
    RespondToDraw { accept: bool },
    Resign,
    Seek(SeekRequest),
    CancelSeek,
    Logout,
    Dispose,

    AuthCompleted {
        scope: ScopeId,
        result: AuthResult,
    },
    ProfileLoaded {
        scope: ScopeId,
        username: Option<String>,
    },
    Account {
        scope: ScopeId,
        event: AccountEvent,
    },
    Game {
        scope: ScopeId,
        event: GameStreamEvent,
    },
    ActionCompleted {
        action: BoardAction,
        ok: bool,
    },
    SeekCompleted {
        scope: ScopeId,
        paired: bool,
    },
}

/// Notifications for the presentation layer, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(AppState),
    AuthenticationFinished {
        success: bool,
    },
    ProfileLoaded {
        username: String,
    },
    GameStarted {
        snapshot: GameSnapshot,
        color: Option<Color>,
    },
    BoardUpdated(GameUpdate),
    DrawOffered,
    GameOver {
        game_id: String,
        status: Option<GameStatus>,
        winner: Option<Color>,
    },
    Clock(ClockDisplay),
    ActionResult {
        action: BoardAction,
        ok: bool,
    },
    SeekFinished {
        paired: bool,
    },
    ChallengeReceived(ChallengeInfo),
    ChallengeCanceled {
        id: String,
    },
}
