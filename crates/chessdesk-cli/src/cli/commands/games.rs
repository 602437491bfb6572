//! One-shot game queries and seeks.

use anyhow::Result;
use chessdesk_core::config::Config;
use chessdesk_types::SeekRequest;
use tokio_util::sync::CancellationToken;

use super::{board_api, token_store};
use crate::interrupt;

pub async fn list(config: &Config) -> Result<()> {
    let games = board_api(config, token_store(config))?.ongoing_games().await?;
    if games.is_empty() {
        println!("No games in progress.");
        return Ok(());
    }

    for game in games {
        let opponent = game
            .opponent
            .as_ref()
            .map_or("?", |o| o.username.as_str());
        let side = game.color.map_or("?", |c| c.as_str());
        let turn = if game.is_my_turn { "your move" } else { "waiting" };
        println!("{}  vs {opponent:<20} as {side:<5}  {turn}", game.stream_id());
    }
    Ok(())
}

pub async fn seek(config: &Config, rated: bool, minutes: u32, increment: u32) -> Result<()> {
    let api = board_api(config, token_store(config))?;
    let request = SeekRequest::standard(rated, minutes, increment);
    println!("Seeking a {minutes}+{increment} game. Press Ctrl+C to stop.");

    let cancel = CancellationToken::new();
    let paired = tokio::select! {
        paired = api.seek(&request, &cancel) => paired,
        () = interrupt::wait_for_interrupt() => {
            cancel.cancel();
            return Err(interrupt::InterruptedError.into());
        }
    };

    if !paired {
        anyhow::bail!("Seek failed; see the log file for details");
    }
    println!("Opponent found. Run `chessdesk play` to join the game.");
    Ok(())
}
