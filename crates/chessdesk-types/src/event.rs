//! Account event stream payloads (`/api/stream/event`).

use serde::{Deserialize, Serialize};

use crate::game::{Color, Variant};

/// One line of the account event stream, dispatched on its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AccountEvent {
    GameStart { game: GameInfo },
    GameFinish { game: GameInfo },
    Challenge { challenge: ChallengeInfo },
    ChallengeCanceled { challenge: ChallengeInfo },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameStatusInfo {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Opponent {
    pub id: Option<String>,
    pub username: String,
    pub rating: Option<u32>,
}

/// Game summary carried by `gameStart`/`gameFinish` and by `nowPlaying`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameInfo {
    pub full_id: String,
    pub game_id: String,
    pub color: Option<Color>,
    pub fen: Option<String>,
    pub last_move: Option<String>,
    pub source: Option<String>,
    pub status: Option<GameStatusInfo>,
    pub variant: Option<Variant>,
    pub speed: Option<String>,
    pub rated: bool,
    pub has_moved: bool,
    pub opponent: Option<Opponent>,
    pub is_my_turn: bool,
    pub seconds_left: Option<u64>,
}

impl GameInfo {
    /// Id to open a game stream with: the full id when present, else the game id.
    pub fn stream_id(&self) -> &str {
        if self.full_id.is_empty() {
            &self.game_id
        } else {
            &self.full_id
        }
    }

    /// True if `id` names this game by either of its ids.
    pub fn refers_to(&self, id: &str) -> bool {
        (!self.full_id.is_empty() && self.full_id == id)
            || (!self.game_id.is_empty() && (self.game_id == id || id.starts_with(&self.game_id)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeUser {
    pub id: String,
    pub name: String,
    pub rating: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChallengeInfo {
    pub id: String,
    pub url: Option<String>,
    pub status: String,
    pub challenger: Option<ChallengeUser>,
    pub dest_user: Option<ChallengeUser>,
    pub variant: Option<Variant>,
    pub rated: bool,
    pub speed: Option<String>,
}
