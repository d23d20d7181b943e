mod presenter;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use traywatch_core::api::ApiClient;
use traywatch_core::constants::env as env_vars;
use traywatch_core::models::derive_status;
use traywatch_core::reporter::build_report;
use traywatch_core::runtime::fetch_identity;
use traywatch_core::secure_storage::{SecureKey, SecureStorage};
use traywatch_core::store::SnapshotReconciler;
use traywatch_core::{Config, RuntimeOptions, StatusLevel, TrayWatch};

use presenter::spawn_presenter;

#[derive(Parser)]
#[command(name = "traywatch")]
#[command(about = "Watch a Mattermost server for unread messages")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch for unread messages until interrupted (default)
    Run {
        /// Write the current icon name to this file on every change
        #[arg(long)]
        status_file: Option<PathBuf>,

        /// Seconds between diagnostic reports
        #[arg(long)]
        report_interval: Option<u64>,
    },

    /// Sync once, print the unread table and the status, then exit
    Check,

    /// Manage the access token in the OS keyring
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store the access token
    Set { token: String },
    /// Remove the stored access token
    Clear,
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Run {
        status_file: None,
        report_interval: None,
    });
    let result = match command {
        Commands::Run {
            status_file,
            report_interval,
        } => run(cli.config, status_file, report_interval).await,
        Commands::Check => check(cli.config).await,
        Commands::Token { action } => token(action),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let debug_enabled = env::var(env_vars::DEBUG)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    Config::load(path.as_deref()).context("Could not load config")
}

async fn run(
    config_path: Option<PathBuf>,
    status_file: Option<PathBuf>,
    report_interval: Option<u64>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let mut options = RuntimeOptions::default();
    if let Some(secs) = report_interval {
        options.report_interval = Duration::from_secs(secs.max(1));
    }

    let (status_tx, status_rx) = watch::channel(StatusLevel::Quiet);
    let presenter = spawn_presenter(status_rx, config.theme, status_file);

    let watcher = TrayWatch::start(&config, Arc::new(status_tx), options).await?;
    wait_for_shutdown().await?;

    info!("Shutting down");
    watcher.shutdown().await;
    presenter.await.context("Presenter task failed")?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

async fn check(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let client = ApiClient::new(&config.host, config.token.clone())?;
    let identity = fetch_identity(&client).await?;

    let reconciler = SnapshotReconciler::new(
        Arc::new(client),
        identity.user.id.clone(),
        identity.teams.clone(),
    );
    let aggregate = reconciler.fetch().await?;
    let report = build_report(&aggregate);

    println!(
        "Logged in as {} on {} ({} teams, {} conversations)",
        identity.user.username,
        config.host,
        identity.teams.len(),
        report.total
    );
    for line in &report.lines {
        println!("{}", line);
    }
    for id in &report.inconsistent {
        println!("warning: negative counts for {}", id);
    }

    let status = derive_status(aggregate.values());
    println!("status: {} (icon {})", status, status.icon_name(config.theme));
    Ok(())
}

fn token(action: TokenAction) -> Result<()> {
    match action {
        TokenAction::Set { token } => {
            SecureStorage::set(SecureKey::AccessToken, token.trim())
                .context("Could not store token")?;
            println!("Token stored in the OS keyring");
        }
        TokenAction::Clear => {
            SecureStorage::delete(SecureKey::AccessToken).context("Could not remove token")?;
            println!("Token removed from the OS keyring");
        }
    }
    Ok(())
}
