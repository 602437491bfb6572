//! Game stream decoding.
//!
//! The first line of every connection is the full game object. It carries no
//! reliable type marker, so it is recognised by shape: an embedded `state`
//! object next to a `white` or `black` player. Later lines are state updates
//! (`gameState`, or untyped with a `moves` list); any other type is skipped.

use chessdesk_types::{Color, GameSnapshot, GameUpdate};
use serde_json::Value;

/// Line types that belong to the game stream but carry no game state.
const IGNORED_TYPES: &[&str] = &["chatLine", "opponentGone"];

/// One notification decoded from the game stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameStreamEvent {
    Snapshot(GameSnapshot),
    /// The board or clocks changed.
    Update(GameUpdate),
    /// The opponent started offering a draw.
    DrawOffered(GameUpdate),
    /// The game reached a terminal status.
    GameOver(GameUpdate),
}

/// Decodes a failure to parse a single line.
#[derive(Debug)]
pub struct DecodeError(serde_json::Error);

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed game stream line: {}", self.0)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Returns true if `value` looks like a full game object.
pub fn is_snapshot_shape(value: &Value) -> bool {
    let has_state = value.get("state").is_some_and(Value::is_object);
    let has_player = value.get("white").is_some_and(Value::is_object)
        || value.get("black").is_some_and(Value::is_object);
    has_state && has_player
}

/// Returns true if a non-snapshot line carries a state update.
fn is_update_shape(kind: Option<&str>, value: &Value) -> bool {
    match kind {
        Some(kind) => kind == "gameState",
        None => value.get("moves").is_some_and(Value::is_string),
    }
}

/// Stateful decoder for one game stream.
///
/// The local side decides which draw flag counts as an offer. It is either
/// known up front (from the `gameStart` notice) or resolved from the snapshot
/// by matching `username` against the players.
#[derive(Debug, Clone)]
pub struct GameStreamDecoder {
    local_color: Option<Color>,
    username: Option<String>,
    seen_snapshot: bool,
    opponent_offering: bool,
}

impl GameStreamDecoder {
    pub fn new(local_color: Option<Color>, username: Option<String>) -> Self {
        Self {
            local_color,
            username,
            seen_snapshot: false,
            opponent_offering: false,
        }
    }

    pub fn local_color(&self) -> Option<Color> {
        self.local_color
    }

    /// Forgets the previous connection; the next line must be a snapshot again.
    ///
    /// A standing draw offer is remembered so the replayed snapshot does not
    /// report it a second time.
    pub fn reset(&mut self) {
        self.seen_snapshot = false;
    }

    /// Decodes one line into zero or more notifications, in delivery order.
    ///
    /// # Errors
    /// Returns an error if the line is not valid JSON of the expected shape.
    pub fn decode_line(&mut self, line: &str) -> Result<Vec<GameStreamEvent>, DecodeError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Vec::new());
        }

        let value: Value = serde_json::from_str(line).map_err(DecodeError)?;
        let kind = value.get("type").and_then(Value::as_str);
        if let Some(kind) = kind
            && IGNORED_TYPES.contains(&kind)
        {
            tracing::debug!(kind, "skipping game stream line");
            return Ok(Vec::new());
        }

        if is_snapshot_shape(&value) {
            return self.decode_snapshot(value);
        }

        if !self.seen_snapshot {
            tracing::warn!("skipping game stream line received before the game snapshot");
            return Ok(Vec::new());
        }

        if !is_update_shape(kind, &value) {
            tracing::debug!(kind = kind.unwrap_or_default(), "skipping unrecognised game stream line");
            return Ok(Vec::new());
        }

        let update: GameUpdate = serde_json::from_value(value).map_err(DecodeError)?;
        let mut events = vec![GameStreamEvent::Update(update.clone())];
        self.follow_up(&update, &mut events);
        Ok(events)
    }

    fn decode_snapshot(&mut self, value: Value) -> Result<Vec<GameStreamEvent>, DecodeError> {
        let snapshot: GameSnapshot = serde_json::from_value(value).map_err(DecodeError)?;
        self.seen_snapshot = true;
        if self.local_color.is_none() {
            self.local_color = self
                .username
                .as_deref()
                .and_then(|name| snapshot.color_of(name));
        }

        let state = snapshot.state.clone();
        let mut events = vec![GameStreamEvent::Snapshot(snapshot)];
        self.follow_up(&state, &mut events);
        Ok(events)
    }

    fn follow_up(&mut self, state: &GameUpdate, events: &mut Vec<GameStreamEvent>) {
        let offering = match self.local_color {
            Some(local) => state.draw_offered_by(local.opposite()),
            // Unknown side: only a single flag can be attributed to the opponent.
            None => state.wdraw != state.bdraw,
        };
        if offering && !self.opponent_offering {
            events.push(GameStreamEvent::DrawOffered(state.clone()));
        }
        self.opponent_offering = offering;

        if state.is_terminal() {
            events.push(GameStreamEvent::GameOver(state.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use chessdesk_types::GameStatus;

    use super::*;

    const SNAPSHOT: &str = r#"{"id":"abcd1234","white":{"name":"Alice"},"black":{"name":"Bob"},"state":{"moves":"","wtime":600000,"btime":600000}}"#;

    fn kinds(events: &[GameStreamEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                GameStreamEvent::Snapshot(_) => "snapshot",
                GameStreamEvent::Update(_) => "update",
                GameStreamEvent::DrawOffered(_) => "draw",
                GameStreamEvent::GameOver(_) => "over",
            })
            .collect()
    }

    #[test]
    fn first_line_is_snapshot_regardless_of_field_order() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        let reordered = r#"{"state":{"moves":"e2e4","wtime":1000,"btime":2000},"black":{"name":"Bob"},"id":"g1","white":{"id":"alice"}}"#;
        let events = decoder.decode_line(reordered).unwrap();
        assert_eq!(kinds(&events), vec!["snapshot"]);

        let events = decoder
            .decode_line(r#"{"moves":"e2e4 e7e5","wtime":900,"btime":2000}"#)
            .unwrap();
        assert_eq!(kinds(&events), vec!["update"]);
    }

    #[test]
    fn snapshot_fields_are_decoded() {
        let mut decoder = GameStreamDecoder::new(None, Some("alice".to_string()));
        let events = decoder.decode_line(SNAPSHOT).unwrap();
        let GameStreamEvent::Snapshot(snapshot) = &events[0] else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.id, "abcd1234");
        assert_eq!(snapshot.state.wtime, 600_000);
        assert_eq!(decoder.local_color(), Some(Color::White));
    }

    #[test]
    fn keep_alives_and_chat_lines_are_skipped() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        assert!(decoder.decode_line("").unwrap().is_empty());
        assert!(decoder.decode_line("   ").unwrap().is_empty());
        assert!(
            decoder
                .decode_line(r#"{"type":"chatLine","username":"Bob","text":"hi","room":"player"}"#)
                .unwrap()
                .is_empty()
        );
        decoder.decode_line(SNAPSHOT).unwrap();
        assert!(
            decoder
                .decode_line(r#"{"type":"opponentGone","gone":true}"#)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn unrecognised_types_after_snapshot_are_skipped() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        decoder.decode_line(SNAPSHOT).unwrap();

        assert!(
            decoder
                .decode_line(r#"{"type":"somethingNew","foo":1}"#)
                .unwrap()
                .is_empty()
        );
        assert!(decoder.decode_line(r#"{"foo":1}"#).unwrap().is_empty());

        let events = decoder
            .decode_line(r#"{"type":"gameState","moves":"e2e4","wtime":599000,"btime":600000}"#)
            .unwrap();
        let [GameStreamEvent::Update(update)] = events.as_slice() else {
            panic!("expected a single update, got {events:?}");
        };
        assert_eq!(update.wtime, 599_000);
    }

    #[test]
    fn repeated_game_object_is_a_snapshot() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        decoder.decode_line(SNAPSHOT).unwrap();
        let full = r#"{"type":"gameFull","id":"abcd1234","white":{"name":"Alice"},"black":{"name":"Bob"},"state":{"type":"gameState","moves":"e2e4"}}"#;
        assert_eq!(kinds(&decoder.decode_line(full).unwrap()), vec!["snapshot"]);
    }

    #[test]
    fn updates_before_snapshot_are_skipped() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        let events = decoder
            .decode_line(r#"{"type":"gameState","moves":"e2e4","wtime":1,"btime":1}"#)
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(kinds(&decoder.decode_line(SNAPSHOT).unwrap()), vec!["snapshot"]);
    }

    #[test]
    fn mate_is_terminal_and_started_is_not() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        decoder.decode_line(SNAPSHOT).unwrap();

        let events = decoder
            .decode_line(r#"{"type":"gameState","moves":"e2e4","status":"started"}"#)
            .unwrap();
        assert_eq!(kinds(&events), vec!["update"]);

        let events = decoder
            .decode_line(r#"{"type":"gameState","moves":"e2e4","status":""}"#)
            .unwrap();
        assert_eq!(kinds(&events), vec!["update"]);

        let events = decoder
            .decode_line(r#"{"type":"gameState","moves":"f2f3 e7e5 g2g4 d8h4","status":"mate","winner":"black"}"#)
            .unwrap();
        assert_eq!(kinds(&events), vec!["update", "over"]);
        let GameStreamEvent::GameOver(update) = &events[1] else {
            panic!("expected game over");
        };
        assert_eq!(update.status, GameStatus::Mate);
        assert_eq!(update.winner, Some(Color::Black));
    }

    #[test]
    fn draw_offer_only_for_opponent_side() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        decoder.decode_line(SNAPSHOT).unwrap();

        let own = decoder
            .decode_line(r#"{"type":"gameState","moves":"e2e4","wdraw":true}"#)
            .unwrap();
        assert_eq!(kinds(&own), vec!["update"]);

        let theirs = decoder
            .decode_line(r#"{"type":"gameState","moves":"e2e4","bdraw":true}"#)
            .unwrap();
        assert_eq!(kinds(&theirs), vec!["update", "draw"]);
    }

    #[test]
    fn draw_offer_fires_on_rising_edge_only() {
        let mut decoder = GameStreamDecoder::new(Some(Color::Black), None);
        decoder.decode_line(SNAPSHOT).unwrap();

        let offer = r#"{"type":"gameState","moves":"e2e4","wdraw":true}"#;
        assert_eq!(kinds(&decoder.decode_line(offer).unwrap()), vec!["update", "draw"]);
        assert_eq!(kinds(&decoder.decode_line(offer).unwrap()), vec!["update"]);

        let withdrawn = r#"{"type":"gameState","moves":"e2e4 e7e5"}"#;
        assert_eq!(kinds(&decoder.decode_line(withdrawn).unwrap()), vec!["update"]);
        assert_eq!(kinds(&decoder.decode_line(offer).unwrap()), vec!["update", "draw"]);
    }

    #[test]
    fn terminal_snapshot_is_followed_by_game_over() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        let line = r#"{"id":"g","white":{},"black":{},"state":{"moves":"","status":"aborted"}}"#;
        assert_eq!(kinds(&decoder.decode_line(line).unwrap()), vec!["snapshot", "over"]);
    }

    #[test]
    fn reset_expects_a_new_snapshot() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        decoder.decode_line(SNAPSHOT).unwrap();
        decoder.reset();
        assert_eq!(kinds(&decoder.decode_line(SNAPSHOT).unwrap()), vec!["snapshot"]);
    }

    #[test]
    fn standing_draw_offer_is_not_repeated_after_reconnect() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        decoder.decode_line(SNAPSHOT).unwrap();
        let offer = r#"{"type":"gameState","moves":"e2e4","bdraw":true}"#;
        assert_eq!(kinds(&decoder.decode_line(offer).unwrap()), vec!["update", "draw"]);

        decoder.reset();
        let replay = r#"{"id":"abcd1234","white":{"name":"Alice"},"black":{"name":"Bob"},"state":{"moves":"e2e4","bdraw":true}}"#;
        assert_eq!(kinds(&decoder.decode_line(replay).unwrap()), vec!["snapshot"]);
    }

    #[test]
    fn malformed_line_is_an_error_and_decoder_continues() {
        let mut decoder = GameStreamDecoder::new(Some(Color::White), None);
        decoder.decode_line(SNAPSHOT).unwrap();
        assert!(decoder.decode_line("{not json").is_err());
        assert_eq!(
            kinds(&decoder.decode_line(r#"{"type":"gameState","moves":"e2e4"}"#).unwrap()),
            vec!["update"]
        );
    }
}
