//! Interactive session: session events go to stdout, commands come from stdin.

use anyhow::{Context, Result};
use chessdesk_core::config::Config;
use chessdesk_core::session::{SessionController, SessionDeps, SessionHandle};
use chessdesk_types::SeekRequest;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{announcing_browser, token_store};
use crate::interrupt;
use crate::presenter::{HELP, PlayCommand, Presenter, parse_command};

pub async fn run(config: &Config) -> Result<()> {
    let deps = SessionDeps::from_config(config, token_store(config), announcing_browser())?;
    let (controller, handle, mut events) = SessionController::new(deps);
    let session = tokio::spawn(controller.run());

    let mut presenter = Presenter::default();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let outcome = loop {
        tokio::select! {
            () = interrupt::wait_for_interrupt() => {
                break Err(interrupt::InterruptedError.into());
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break Ok(());
                };
                if let Some(line) = presenter.handle(&event) {
                    println!("{line}");
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line.context("read stdin") {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match parse_command(&line) {
                        Ok(PlayCommand::Quit) => break Ok(()),
                        Ok(command) => apply(&handle, &presenter, command),
                        Err(message) => eprintln!("{message}"),
                    },
                    // Without stdin the session keeps running until Ctrl+C.
                    Ok(None) => stdin_open = false,
                    Err(err) => break Err(err),
                }
            }
        }
    };

    handle.dispose();
    if let Err(err) = session.await {
        tracing::warn!(error = %err, "session task failed");
    }
    outcome
}

fn apply(handle: &SessionHandle, presenter: &Presenter, command: PlayCommand) {
    match command {
        PlayCommand::Login => handle.start_authentication(),
        PlayCommand::Move(uci) => handle.make_move(&uci),
        PlayCommand::Draw => handle.offer_draw(),
        PlayCommand::Accept => handle.respond_to_draw(true),
        PlayCommand::Decline => handle.respond_to_draw(false),
        PlayCommand::Resign => handle.resign(),
        PlayCommand::Home => handle.return_to_home(),
        PlayCommand::Seek { minutes, increment } => {
            println!("Seeking a {minutes}+{increment} game; `cancel` stops.");
            handle.seek(SeekRequest::standard(false, minutes, increment));
        }
        PlayCommand::CancelSeek => handle.cancel_seek(),
        PlayCommand::Clock => println!("{}", presenter.clock_line()),
        PlayCommand::Logout => handle.logout(),
        PlayCommand::Help => println!("{HELP}"),
        PlayCommand::Quit => {}
    }
}
