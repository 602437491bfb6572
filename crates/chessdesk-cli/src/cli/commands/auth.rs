//! Login, logout and account status.

use std::sync::Arc;

use anyhow::{Context, Result};
use chessdesk_core::auth::AuthFlow;
use chessdesk_core::api::request_client;
use chessdesk_core::config::Config;
use chessdesk_core::token_store::{TokenStore, mask_token};

use super::{announcing_browser, board_api, env_token_store, token_store};
use crate::interrupt;

pub async fn login(config: &Config) -> Result<()> {
    let tokens = token_store(config);
    let flow = AuthFlow::new(
        request_client(config)?,
        config.endpoints()?,
        config.auth.clone(),
        Arc::clone(&tokens),
        announcing_browser(),
    );

    let result = tokio::select! {
        () = interrupt::wait_for_interrupt() => {
            flow.cancel();
            return Err(interrupt::InterruptedError.into());
        }
        result = flow.start_authentication() => result,
    };

    let Some(token) = result.token.filter(|_| result.success) else {
        anyhow::bail!("Login failed; see the log file for details");
    };
    println!("Logged in (token {}).", mask_token(&token));

    match board_api(config, tokens)?.account().await {
        Ok(profile) => println!("Welcome, {}.", profile.username),
        Err(err) => tracing::warn!(error = %format!("{err:#}"), "profile lookup after login failed"),
    }
    Ok(())
}

pub fn logout(config: &Config) -> Result<()> {
    let tokens = env_token_store(config);
    if tokens.has_token() {
        tokens.clear().context("clear stored token")?;
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    if tokens.is_overridden() {
        println!("CHESSDESK_TOKEN is still set and keeps supplying a token; unset it to stay logged out.");
    }
    Ok(())
}

pub async fn status(config: &Config) -> Result<()> {
    let tokens = token_store(config);
    if !tokens.has_token() {
        println!("Not logged in. Run `chessdesk login`.");
        return Ok(());
    }

    let profile = board_api(config, tokens)?.account().await?;
    println!("{}", profile.username);
    if let Some(since) = profile
        .created_at
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
    {
        println!("  member since {}", since.format("%Y-%m-%d"));
    }
    for (perf, stat) in profile.perfs.iter().filter(|(_, s)| s.games > 0) {
        let provisional = if stat.prov { "?" } else { "" };
        println!(
            "  {perf:<14} {}{provisional} ({} games)",
            stat.rating, stat.games
        );
    }
    if let Some(playing) = profile.playing {
        println!("  playing {playing}");
    }
    Ok(())
}
