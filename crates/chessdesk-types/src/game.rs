//! Game stream payloads (`gameFull` and `gameState` lines) and seek requests.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Game status as reported by the server.
///
/// Unrecognised values (including the empty string) decode as `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    Created,
    #[default]
    Started,
    Aborted,
    Mate,
    Resign,
    Stalemate,
    Timeout,
    Draw,
    Outoftime,
    Cheat,
    NoStart,
    UnknownFinish,
    VariantEnd,
    #[serde(other)]
    Other,
}

impl GameStatus {
    /// Returns true if the game can no longer continue.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GameStatus::Mate
                | GameStatus::Resign
                | GameStatus::Draw
                | GameStatus::Aborted
                | GameStatus::Stalemate
                | GameStatus::Timeout
                | GameStatus::Outoftime
                | GameStatus::Cheat
                | GameStatus::NoStart
                | GameStatus::VariantEnd
                | GameStatus::UnknownFinish
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variant {
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
}

/// Clock configuration of a real-time game, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub initial: u64,
    pub increment: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Perf {
    pub name: String,
}

/// One side of a game. AI opponents have no id/name but an `aiLevel`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Player {
    pub id: Option<String>,
    pub name: Option<String>,
    pub rating: Option<u32>,
    pub title: Option<String>,
    pub provisional: bool,
    pub ai_level: Option<u8>,
}

impl Player {
    pub fn display_name(&self) -> String {
        match (&self.name, self.ai_level) {
            (Some(name), _) => match &self.title {
                Some(title) => format!("{title} {name}"),
                None => name.clone(),
            },
            (None, Some(level)) => format!("Stockfish level {level}"),
            (None, None) => "Anonymous".to_string(),
        }
    }

    /// Case-insensitive match against the player's id or name.
    pub fn is(&self, username: &str) -> bool {
        [&self.id, &self.name]
            .into_iter()
            .flatten()
            .any(|value| value.eq_ignore_ascii_case(username))
    }
}

/// Incremental state push (`gameState`), also embedded in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameUpdate {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Space-separated UCI moves since the initial position.
    pub moves: String,
    /// White's remaining time in milliseconds.
    pub wtime: u64,
    /// Black's remaining time in milliseconds.
    pub btime: u64,
    pub winc: u64,
    pub binc: u64,
    pub status: GameStatus,
    pub winner: Option<Color>,
    pub wdraw: bool,
    pub bdraw: bool,
    pub wtakeback: bool,
    pub btakeback: bool,
}

impl GameUpdate {
    pub fn move_count(&self) -> usize {
        self.moves.split_whitespace().count()
    }

    pub fn last_move(&self) -> Option<&str> {
        self.moves.split_whitespace().last()
    }

    pub fn side_to_move(&self) -> Color {
        if self.move_count() % 2 == 0 {
            Color::White
        } else {
            Color::Black
        }
    }

    pub fn draw_offered_by(&self, color: Color) -> bool {
        match color {
            Color::White => self.wdraw,
            Color::Black => self.bdraw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Full initial state of a game (`gameFull`), the first line of a game stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameSnapshot {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub id: String,
    pub rated: bool,
    pub variant: Variant,
    pub clock: Option<ClockConfig>,
    pub speed: String,
    pub perf: Perf,
    pub created_at: Option<i64>,
    pub white: Player,
    pub black: Player,
    pub initial_fen: String,
    pub state: GameUpdate,
}

impl GameSnapshot {
    pub fn player(&self, color: Color) -> &Player {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    /// Which side `username` plays, if either.
    pub fn color_of(&self, username: &str) -> Option<Color> {
        if self.white.is(username) {
            Some(Color::White)
        } else if self.black.is(username) {
            Some(Color::Black)
        } else {
            None
        }
    }
}

/// Body of a board seek (`/api/board/seek`). `time` is in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeekRequest {
    pub rated: bool,
    pub time: u32,
    pub increment: u32,
    pub variant: String,
    pub color: String,
}

impl SeekRequest {
    pub fn standard(rated: bool, minutes: u32, increment_secs: u32) -> Self {
        Self {
            rated,
            time: minutes,
            increment: increment_secs,
            variant: "standard".to_string(),
            color: "random".to_string(),
        }
    }
}
