//! calendar-reminder entry point.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use calendar_reminder::automation::{EventBus, ReminderScheduler, ReminderService, SystemClock};
use calendar_reminder::cli::{self, DEFAULT_CONFIG_PATH};
use calendar_reminder::config::AppConfig;
use calendar_reminder::server::{self, ServerState};

/// Sends reminders ahead of calendar appointments.
#[derive(Parser)]
#[command(name = "calendar-reminder")]
#[command(about = "Background calendar reminder engine")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, env = "CALENDAR_REMINDER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reminder engine and the status server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single tick and print its report
    Once,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective config
    Show,

    /// Validate config
    Validate,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, found) = cli::load_config(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    cli::init_logging(&config.logging.level, cli.verbose);
    if !found {
        tracing::debug!("No config at {}, using defaults", cli.config.display());
    }

    match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Once => once(config).await,
        Commands::Config { action } => match action {
            ConfigCommands::Show => {
                println!("# {}", cli::expand_path(&cli.config).display());
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigCommands::Validate => {
                config.validate()?;
                println!("Config OK");
                Ok(())
            }
            ConfigCommands::Init { force } => init_config(&cli.config, force),
        },
    }
}

async fn serve(mut config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let calendar = cli::build_calendar(&config);
    let notifier = cli::build_notifier(&config)?;
    let service = Arc::new(ReminderService::new(config.reminders.clone(), calendar, notifier));

    service.start_reminder_automation().await?;

    let state = Arc::new(ServerState::new(Arc::clone(&service)));
    let result = server::serve(
        &config.server_addr(),
        state,
        config.server.cors_enabled,
        shutdown_signal(),
    )
    .await;

    service.cleanup().await;
    result?;
    Ok(())
}

async fn once(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;

    let mut scheduler = ReminderScheduler::new(
        config.reminders.clone(),
        cli::build_calendar(&config),
        cli::build_notifier(&config)?,
        Arc::new(SystemClock),
        EventBus::new(),
    );

    let report = scheduler.tick().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_config(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    let path = cli::expand_path(path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    AppConfig::default().save(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
