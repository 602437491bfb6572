//! Account event stream decoding.

use chessdesk_types::AccountEvent;

/// Decodes one event-stream line. Unknown `type` values decode to
/// [`AccountEvent::Other`]; lines without a `type` are errors.
///
/// # Errors
/// Returns an error if the line is not a tagged JSON object.
pub fn decode_account_event(line: &str) -> Result<AccountEvent, serde_json::Error> {
    serde_json::from_str(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_game_start() {
        let event = decode_account_event(
            r#"{"type":"gameStart","game":{"fullId":"abcd1234","gameId":"abcd","color":"white"}}"#,
        )
        .unwrap();
        let AccountEvent::GameStart { game } = event else {
            panic!("expected gameStart, got {event:?}");
        };
        assert_eq!(game.stream_id(), "abcd1234");
    }

    #[test]
    fn unknown_type_is_other() {
        assert_eq!(
            decode_account_event(r#"{"type":"rematchOffer","id":"x"}"#).unwrap(),
            AccountEvent::Other
        );
    }

    #[test]
    fn untagged_line_is_an_error() {
        assert!(decode_account_event(r#"{"game":{}}"#).is_err());
        assert!(decode_account_event("not json").is_err());
    }
}
