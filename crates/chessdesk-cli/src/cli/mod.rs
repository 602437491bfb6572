//! CLI entry and dispatch.

use anyhow::{Context, Result};
use chessdesk_core::config;
use clap::Parser;

use crate::{interrupt, logging};

mod commands;

#[derive(Parser)]
#[command(name = "chessdesk")]
#[command(version)]
#[command(about = "Play on a chess server from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Also print logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in through the browser (OAuth with PKCE)
    Login,
    /// Forget the stored access token
    Logout,
    /// Show the logged-in account
    Status,
    /// List games in progress
    Games,
    /// Look for an opponent and wait until paired
    Seek {
        /// Initial clock time in minutes
        #[arg(long, default_value_t = 10)]
        minutes: u32,
        /// Increment per move in seconds
        #[arg(long, default_value_t = 0)]
        increment: u32,
        /// Play a rated game
        #[arg(long)]
        rated: bool,
    },
    /// Run the interactive session (default)
    Play,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Config commands stay side-effect free: no log file, no handler.
    if let Some(Commands::Config { command }) = &cli.command {
        return match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        };
    }

    let _log_guard = match logging::init(cli.verbose) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };
    interrupt::init()?;

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;

    match cli.command.unwrap_or(Commands::Play) {
        Commands::Login => commands::auth::login(&config).await,
        Commands::Logout => commands::auth::logout(&config),
        Commands::Status => commands::auth::status(&config).await,
        Commands::Games => commands::games::list(&config).await,
        Commands::Seek {
            minutes,
            increment,
            rated,
        } => commands::games::seek(&config, rated, minutes, increment).await,
        Commands::Play => commands::play::run(&config).await,
        Commands::Config { .. } => Ok(()),
    }
}
