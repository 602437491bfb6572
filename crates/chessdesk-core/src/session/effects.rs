//! Effects returned by the session reducer for the runtime to execute.
//!
//! The reducer decides; the runtime spawns tasks, cancels scopes and drives
//! the clock. Effects run in the order returned.

use chessdesk_types::{Color, SeekRequest};

use super::events::SessionEvent;
use super::state::ScopeId;
use crate::api::BoardAction;

#[derive(Debug)]
pub enum SessionEffect {
    /// Forward a notification to the presenter.
    Notify(SessionEvent),

    /// Cancel everything running under `scope`.
    CancelScope(ScopeId),

    StartAuthentication {
        scope: ScopeId,
    },
    OpenEventStream {
        scope: ScopeId,
    },
    /// Fetch the account under the event-stream scope.
    FetchProfile {
        scope: ScopeId,
    },
    OpenGameStream {
        scope: ScopeId,
        game_id: String,
        color: Option<Color>,
        username: Option<String>,
    },
    Seek {
        scope: ScopeId,
        request: SeekRequest,
    },
    PostAction {
        game_id: String,
        action: BoardAction,
    },

    SyncClock {
        white_ms: u64,
        black_ms: u64,
        is_playing_white: bool,
        is_player_turn: bool,
    },
    StopClock,
    ResetClock,
    DisposeClock,

    ClearToken,
}
