//! vrc-spotify - Spotify "now playing" in the VRChat chatbox
//!
//! Polls the Spotify Web API and republishes the current track over OSC.

mod afk;
mod api;
mod auth;
mod config;
mod error;
mod models;
mod osc;
mod presence;
mod render;
mod rotation;
mod session;
mod specs;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{AppConfig, DataPaths};

#[derive(Parser)]
#[command(name = "vrc-spotify")]
#[command(about = "Show what you're playing on Spotify in the VRChat chatbox", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding config.json and tokens.json
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize with Spotify in the browser
    Login {
        /// Spotify app client ID (saved to the config)
        #[arg(long)]
        client_id: Option<String>,
    },

    /// Clear stored tokens
    Logout,

    /// Show auth state and whether Spotify/VRChat are running
    Status,

    /// Poll Spotify and update the chatbox until Ctrl+C
    Run,

    /// Print the message that would be sent now
    Preview,

    /// Send a message to the chatbox (defaults to the preview)
    SendTest {
        /// Text to send instead of the preview
        text: Option<String>,
    },

    /// Show the typing indicator for a few seconds
    Typing {
        /// How long to show it
        #[arg(short, long, default_value = "3")]
        secs: u64,
    },

    /// Press jump once
    Jump,

    /// Inspect or reset the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective config
    Show,
    /// Restore defaults
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let paths = DataPaths::resolve(cli.data_dir)?;

    match cli.command {
        Commands::Login { client_id } => {
            tracing::info!("Starting authentication flow...");
            auth::login(&paths, client_id).await?;
        }
        Commands::Logout => {
            auth::logout(&paths).await?;
        }
        Commands::Status => {
            auth::status(&paths).await?;
            println!(
                "Spotify:     {}",
                presence::detect_any(presence::SPOTIFY).await
            );
            println!(
                "VRChat:      {}",
                presence::detect_any(presence::VRCHAT).await
            );
            println!("Config file: {}", paths.config_file().display());
            println!("Data dir:    {}", paths.dir().display());
        }
        Commands::Run => {
            session::run(&paths).await?;
        }
        Commands::Preview => {
            session::preview(&paths).await?;
        }
        Commands::SendTest { text } => {
            session::send_test(&paths, text).await?;
        }
        Commands::Typing { secs } => {
            session::typing(&paths, secs).await?;
        }
        Commands::Jump => {
            session::jump(&paths).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Path => {
                println!("{}", paths.config_file().display());
            }
            ConfigAction::Show => {
                let cfg = AppConfig::load(&paths.config_file())?;
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            }
            ConfigAction::Reset => {
                AppConfig::reset(&paths.config_file())?;
                println!("Config reset to defaults: {}", paths.config_file().display());
            }
        },
    }

    Ok(())
}
