//! Account payloads (`/api/account`, `/api/account/playing`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::GameInfo;

/// Rating summary for one performance category.
///
/// Puzzle storm/racer entries carry `runs`/`score` instead of ratings; both
/// shapes decode into this struct with the missing fields defaulted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfStat {
    pub games: u32,
    pub rating: u32,
    pub rd: u32,
    pub prog: i32,
    pub prov: bool,
    pub runs: u32,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayTime {
    pub total: u64,
    pub tv: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Count {
    pub all: u32,
    pub rated: u32,
    pub ai: u32,
    pub draw: u32,
    pub draw_h: u32,
    pub loss: u32,
    pub loss_h: u32,
    pub win: u32,
    pub win_h: u32,
    pub bookmark: u32,
    pub playing: u32,
    pub import: u32,
    pub me: u32,
}

/// The logged-in user's public profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub perfs: BTreeMap<String, PerfStat>,
    /// Milliseconds since epoch.
    pub created_at: Option<i64>,
    /// Milliseconds since epoch.
    pub seen_at: Option<i64>,
    pub play_time: Option<PlayTime>,
    pub url: Option<String>,
    /// URL of the game currently being played, if any.
    pub playing: Option<String>,
    pub count: Option<Count>,
}

/// Response of `/api/account/playing`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActiveGames {
    pub now_playing: Vec<GameInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_decodes_mixed_perf_shapes() {
        let json = r#"{
            "id": "alice",
            "username": "Alice",
            "perfs": {
                "blitz": {"games": 12, "rating": 1500, "rd": 60, "prog": -4, "prov": false},
                "storm": {"runs": 3, "score": 21}
            },
            "createdAt": 1700000000000,
            "count": {"all": 12, "win": 7, "drawH": 1}
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.username, "Alice");
        assert_eq!(profile.perfs["blitz"].rating, 1500);
        assert_eq!(profile.perfs["storm"].score, 21);
        assert_eq!(profile.count.unwrap().draw_h, 1);
        assert!(profile.play_time.is_none());
    }

    #[test]
    fn active_games_default_to_empty() {
        let games: ActiveGames = serde_json::from_str("{}").unwrap();
        assert!(games.now_playing.is_empty());
    }
}
