//! CLI parser and command dispatch.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;

use crate::config::Settings;
use crate::pipeline::PipelineStatus;
use crate::server::{self, AppState};

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "Event-driven recording pipeline for a lecture-capture platform")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides the platform default)
    #[arg(long, short = 'd', global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory, config file, and database
    Init,

    /// Run pending database migrations
    Migrate,

    /// Start the HTTP API server
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (defaults to config)
        bind: Option<String>,
    },

    /// Drain queued messages into the database
    Drain {
        #[command(subcommand)]
        command: DrainCommands,
    },

    /// Show pipeline status for a recording
    Status {
        /// Recording ID
        recording_id: String,
    },
}

#[derive(Subcommand)]
enum DrainCommands {
    /// Drain transcription results into transcript rows
    Results {
        /// Seconds between passes; 0 runs a single pass
        #[arg(long, default_value = "0")]
        interval: u64,
    },
    /// Drain certification requests for a school and sweep expired rows
    Auth {
        /// School ID whose queue to drain
        #[arg(long)]
        school: String,
        /// Seconds between passes; 0 runs a single pass
        #[arg(long, default_value = "0")]
        interval: u64,
    },
    /// Drain queued notifications for a receiver
    Notifications {
        /// Receiver user ID whose queue to drain
        #[arg(long)]
        receiver: String,
        /// Seconds between passes; 0 runs a single pass
        #[arg(long, default_value = "0")]
        interval: u64,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Init => cmd_init(&settings).await,
        Commands::Migrate => cmd_migrate(&settings).await,
        Commands::Serve { bind } => cmd_serve(&settings, bind.as_deref()).await,
        Commands::Drain { command } => cmd_drain(&settings, command).await,
        Commands::Status { recording_id } => cmd_status(&settings, &recording_id).await,
    }
}

async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let config_path = settings.init_data_dir()?;
    println!("{} Config at {}", style("→").cyan(), config_path.display());

    println!("{} Running migrations...", style("→").cyan());
    let db = settings.create_db_context();
    db.init_schema().await?;

    println!(
        "{} Initialized lectern in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    Ok(())
}

async fn cmd_migrate(settings: &Settings) -> anyhow::Result<()> {
    println!("{} Running migrations...", style("→").cyan());
    let db = settings.create_db_context();
    db.init_schema().await?;
    println!("{} Database ready", style("✓").green());
    Ok(())
}

async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, settings)?,
        None => (settings.server.host.clone(), settings.server.port),
    };
    server::serve(settings, &host, port).await
}

async fn cmd_drain(settings: &Settings, command: DrainCommands) -> anyhow::Result<()> {
    let state = AppState::new(settings).await?;
    let (label, interval) = match &command {
        DrainCommands::Results { interval } => ("transcript results", *interval),
        DrainCommands::Auth { school, interval } => {
            println!("{} Draining auth queue for school {}", style("→").cyan(), school);
            ("certification requests", *interval)
        }
        DrainCommands::Notifications { receiver, interval } => {
            println!(
                "{} Draining notifications for receiver {}",
                style("→").cyan(),
                receiver
            );
            ("notifications", *interval)
        }
    };

    loop {
        let drained = match &command {
            DrainCommands::Results { .. } => state.pipeline.drain_results().await?,
            DrainCommands::Auth { school, .. } => {
                let summary = state.auth.drain_for_school(school).await?;
                if summary.swept > 0 {
                    println!(
                        "  {} Swept {} expired request(s)",
                        style("→").dim(),
                        summary.swept
                    );
                }
                summary.inserted
            }
            DrainCommands::Notifications { receiver, .. } => {
                state.notifications.drain_for_receiver(receiver).await?
            }
        };
        println!("{} Drained {} {}", style("✓").green(), drained, label);

        if interval == 0 {
            return Ok(());
        }
        println!(
            "{} Sleeping for {}s before next pass...",
            style("→").dim(),
            interval
        );
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}

async fn cmd_status(settings: &Settings, recording_id: &str) -> anyhow::Result<()> {
    let state = AppState::new(settings).await?;
    match state.pipeline.status(recording_id).await? {
        PipelineStatus::Processing { hint } => {
            println!("{} Processing: {}", style("→").cyan(), hint);
        }
        PipelineStatus::Ready(detail) => {
            let r = &detail.recording;
            println!("{} {}", style("Recording").bold(), r.id);
            println!("  title:  {}", r.title);
            println!("  sync:   {}", r.sync_status.as_str());
            match &detail.transcript {
                Some(t) => println!(
                    "  transcript: {} ({})",
                    t.id,
                    style(t.status.as_str()).cyan()
                ),
                None => println!("  transcript: {}", style("none").dim()),
            }
            match &detail.note {
                Some(n) => println!(
                    "  note:       {} ({})",
                    n.id,
                    style(n.status.as_str()).cyan()
                ),
                None => println!("  note:       {}", style("none").dim()),
            }
        }
    }
    Ok(())
}

/// Accepts `PORT`, `HOST`, or `HOST:PORT`.
fn parse_bind_address(bind: &str, settings: &Settings) -> anyhow::Result<(String, u16)> {
    if let Ok(port) = bind.parse::<u16>() {
        return Ok((settings.server.host.clone(), port));
    }
    if let Some((host, port)) = bind.rsplit_once(':') {
        let port: u16 = port
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid port in bind address: {}", bind))?;
        return Ok((host.to_string(), port));
    }
    Ok((bind.to_string(), settings.server.port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        Settings {
            data_dir: PathBuf::from("/tmp/lectern-test"),
            database_url: "/tmp/lectern-test/lectern.db".to_string(),
            broker: Default::default(),
            redis_url: None,
            llm: Default::default(),
            server: Default::default(),
        }
    }

    #[test]
    fn bind_address_forms() {
        let settings = test_settings();
        assert_eq!(
            parse_bind_address("9000", &settings).unwrap(),
            ("127.0.0.1".to_string(), 9000)
        );
        assert_eq!(
            parse_bind_address("0.0.0.0:9000", &settings).unwrap(),
            ("0.0.0.0".to_string(), 9000)
        );
        assert_eq!(
            parse_bind_address("0.0.0.0", &settings).unwrap(),
            ("0.0.0.0".to_string(), 8460)
        );
    }
}
