//! Line-oriented presentation of session events, and parsing of the
//! commands typed while playing.

use chessdesk_core::BoardAction;
use chessdesk_core::clock::ClockDisplay;
use chessdesk_core::session::{AppState, SessionEvent};
use chessdesk_types::{Color, GameStatus};

/// A command typed at the play prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayCommand {
    Login,
    Move(String),
    Draw,
    Accept,
    Decline,
    Resign,
    Home,
    Seek { minutes: u32, increment: u32 },
    CancelSeek,
    Clock,
    Logout,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  login                 authenticate in the browser
  seek <min> [inc]      look for an opponent (default 10 0)
  cancel                stop seeking
  move <uci>            play a move, e.g. `move e2e4` (or just `e2e4`)
  draw                  offer a draw
  accept | decline      answer a draw offer
  resign                resign the game
  home                  leave the game screen
  clock                 show both clocks
  logout                forget the stored token
  quit                  exit";

/// Parses one input line.
///
/// # Errors
/// Returns a message for unknown commands or bad arguments.
pub fn parse_command(line: &str) -> Result<PlayCommand, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("type `help` for commands".to_string());
    };
    let args: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "login" => PlayCommand::Login,
        "move" | "m" => match args.as_slice() {
            [uci] => PlayCommand::Move(parse_uci(uci)?),
            _ => return Err("usage: move <uci>".to_string()),
        },
        "draw" => PlayCommand::Draw,
        "accept" | "yes" => PlayCommand::Accept,
        "decline" | "no" => PlayCommand::Decline,
        "resign" => PlayCommand::Resign,
        "home" => PlayCommand::Home,
        "seek" => {
            let number = |value: Option<&&str>, default: u32| match value {
                Some(v) => v.parse().map_err(|_| format!("not a number: {v}")),
                None => Ok(default),
            };
            PlayCommand::Seek {
                minutes: number(args.first(), 10)?,
                increment: number(args.get(1), 0)?,
            }
        }
        "cancel" => PlayCommand::CancelSeek,
        "clock" => PlayCommand::Clock,
        "logout" => PlayCommand::Logout,
        "help" | "?" => PlayCommand::Help,
        "quit" | "exit" | "q" => PlayCommand::Quit,
        other if args.is_empty() && looks_like_uci(other) => PlayCommand::Move(other.to_string()),
        other => return Err(format!("unknown command `{other}`; type `help`")),
    };
    Ok(command)
}

fn looks_like_uci(text: &str) -> bool {
    let bytes = text.as_bytes();
    let square = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);
    match bytes {
        [f1, r1, f2, r2] => square(*f1, *r1) && square(*f2, *r2),
        [f1, r1, f2, r2, promo] => square(*f1, *r1) && square(*f2, *r2) && b"qrbn".contains(promo),
        _ => false,
    }
}

fn parse_uci(text: &str) -> Result<String, String> {
    let text = text.to_ascii_lowercase();
    if looks_like_uci(&text) {
        Ok(text)
    } else {
        Err(format!("not a UCI move: {text}"))
    }
}

fn describe_action(action: &BoardAction) -> String {
    match action {
        BoardAction::Move { uci } => format!("move {uci}"),
        BoardAction::Draw { accept: true } => "draw offer".to_string(),
        BoardAction::Draw { accept: false } => "draw decline".to_string(),
        BoardAction::Resign => "resignation".to_string(),
    }
}

fn describe_result(status: Option<GameStatus>, winner: Option<Color>) -> String {
    let status = status.map_or_else(|| "ended".to_string(), |s| format!("{s:?}").to_lowercase());
    match winner {
        Some(color) => format!("{status}, {color} wins"),
        None => status,
    }
}

/// Turns session events into output lines.
///
/// Clock ticks arrive every second; only the first one after a board change
/// is printed, the rest are kept for the `clock` command.
#[derive(Debug, Default)]
pub struct Presenter {
    clock: Option<ClockDisplay>,
    show_next_clock: bool,
}

impl Presenter {
    pub fn clock_line(&self) -> String {
        match &self.clock {
            Some(clock) => format!("you {}  |  opponent {}", clock.player, clock.opponent),
            None => "no clock running".to_string(),
        }
    }

    pub fn handle(&mut self, event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::StateChanged(AppState::Authorization) => {
                Some("Not logged in. Type `login` to authenticate.".to_string())
            }
            SessionEvent::StateChanged(AppState::Home) => {
                self.clock = None;
                Some("Home. Waiting for games; `seek 10 0` looks for an opponent.".to_string())
            }
            SessionEvent::StateChanged(AppState::Game) => None,
            SessionEvent::AuthenticationFinished { success: true } => {
                Some("Login succeeded.".to_string())
            }
            SessionEvent::AuthenticationFinished { success: false } => {
                Some("Login failed; type `login` to retry.".to_string())
            }
            SessionEvent::ProfileLoaded { username } => Some(format!("Logged in as {username}.")),
            SessionEvent::GameStarted { snapshot, color } => {
                self.show_next_clock = true;
                let side = color.map_or_else(|| "unknown side".to_string(), |c| format!("you play {c}"));
                let clock = snapshot.clock.map_or_else(String::new, |c| {
                    format!(" {}+{}", c.initial / 60_000, c.increment / 1000)
                });
                Some(format!(
                    "Game {}: {} vs {}{clock}, {side}.",
                    snapshot.id,
                    snapshot.white.display_name(),
                    snapshot.black.display_name(),
                ))
            }
            SessionEvent::BoardUpdated(update) => {
                self.show_next_clock = true;
                Some(match update.last_move() {
                    Some(last) => format!(
                        "{}. {last}  ({} to move)",
                        update.move_count().div_ceil(2),
                        update.side_to_move()
                    ),
                    None => format!("No moves yet ({} to move)", update.side_to_move()),
                })
            }
            SessionEvent::DrawOffered => {
                Some("Your opponent offers a draw: `accept` or `decline`.".to_string())
            }
            SessionEvent::GameOver { status, winner, .. } => Some(format!(
                "Game over: {}. Type `home` to leave.",
                describe_result(*status, *winner)
            )),
            SessionEvent::Clock(display) => {
                self.clock = Some(display.clone());
                std::mem::take(&mut self.show_next_clock).then(|| self.clock_line())
            }
            SessionEvent::ActionResult { action, ok } => {
                (!ok).then(|| format!("The server rejected the {}.", describe_action(action)))
            }
            SessionEvent::SeekFinished { paired: true } => Some("Opponent found.".to_string()),
            SessionEvent::SeekFinished { paired: false } => {
                Some("Seek ended without a game.".to_string())
            }
            SessionEvent::ChallengeReceived(challenge) => {
                let from = challenge
                    .challenger
                    .as_ref()
                    .map_or("someone", |user| user.name.as_str());
                Some(format!("Challenge {} from {from}.", challenge.id))
            }
            SessionEvent::ChallengeCanceled { id } => Some(format!("Challenge {id} canceled.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use chessdesk_types::{GameSnapshot, GameUpdate, Player};

    use super::*;

    #[test]
    fn parses_commands_and_bare_moves() {
        assert_eq!(parse_command("move e2e4"), Ok(PlayCommand::Move("e2e4".to_string())));
        assert_eq!(parse_command("E7E8Q"), Ok(PlayCommand::Move("e7e8q".to_string())));
        assert_eq!(
            parse_command("seek 5 3"),
            Ok(PlayCommand::Seek {
                minutes: 5,
                increment: 3
            })
        );
        assert_eq!(
            parse_command("seek"),
            Ok(PlayCommand::Seek {
                minutes: 10,
                increment: 0
            })
        );
        assert_eq!(parse_command("  quit "), Ok(PlayCommand::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("").is_err());
        assert!(parse_command("move").is_err());
        assert!(parse_command("move e9e4").is_err());
        assert!(parse_command("seek ten").is_err());
        assert!(parse_command("castle").is_err());
    }

    #[test]
    fn prints_one_clock_line_per_board_change() {
        let mut presenter = Presenter::default();
        let tick = |player: &str| {
            SessionEvent::Clock(ClockDisplay {
                player: player.to_string(),
                opponent: "00:10:00".to_string(),
            })
        };

        let update = GameUpdate {
            moves: "e2e4 e7e5 g1f3".to_string(),
            ..GameUpdate::default()
        };
        assert_eq!(
            presenter.handle(&SessionEvent::BoardUpdated(update)).as_deref(),
            Some("2. g1f3  (black to move)")
        );
        assert_eq!(
            presenter.handle(&tick("00:09:58")).as_deref(),
            Some("you 00:09:58  |  opponent 00:10:00")
        );
        assert_eq!(presenter.handle(&tick("00:09:57")), None);
        assert_eq!(presenter.clock_line(), "you 00:09:57  |  opponent 00:10:00");
    }

    #[test]
    fn describes_game_start_and_end() {
        let mut presenter = Presenter::default();
        let snapshot = GameSnapshot {
            id: "abcd1234".to_string(),
            white: Player {
                name: Some("Alice".to_string()),
                ..Player::default()
            },
            black: Player {
                ai_level: Some(3),
                ..Player::default()
            },
            ..GameSnapshot::default()
        };
        assert_eq!(
            presenter
                .handle(&SessionEvent::GameStarted {
                    snapshot,
                    color: Some(Color::White)
                })
                .as_deref(),
            Some("Game abcd1234: Alice vs Stockfish level 3, you play white.")
        );
        assert_eq!(
            presenter
                .handle(&SessionEvent::GameOver {
                    game_id: "abcd1234".to_string(),
                    status: Some(GameStatus::Mate),
                    winner: Some(Color::Black),
                })
                .as_deref(),
            Some("Game over: mate, black wins. Type `home` to leave.")
        );
    }

    #[test]
    fn accepted_actions_are_silent() {
        let mut presenter = Presenter::default();
        let action = BoardAction::Resign;
        assert_eq!(
            presenter.handle(&SessionEvent::ActionResult {
                action: action.clone(),
                ok: true
            }),
            None
        );
        assert_eq!(
            presenter
                .handle(&SessionEvent::ActionResult { action, ok: false })
                .as_deref(),
            Some("The server rejected the resignation.")
        );
    }
}
