//! Wire types for the chess server's JSON and NDJSON payloads.
//!
//! Everything here is plain serde data. Decoding policy (snapshot detection,
//! terminal statuses, draw-offer edges) lives in `chessdesk-core`.

pub mod account;
pub mod auth;
pub mod event;
pub mod game;

pub use account::{ActiveGames, Count, PerfStat, PlayTime, Profile};
pub use auth::TokenResponse;
pub use event::{AccountEvent, ChallengeInfo, ChallengeUser, GameInfo, GameStatusInfo, Opponent};
pub use game::{
    ClockConfig, Color, GameSnapshot, GameStatus, GameUpdate, Perf, Player, SeekRequest, Variant,
};
