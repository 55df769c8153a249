//! Menu board sync daemon
//!
//! Keeps a local menu-board document in sync with the configured remote
//! store: loads the persisted copy, polls the remote, and logs changes until
//! interrupted. With `--once` it performs a single forced sync and exits.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use menuboard_common::config::{
    default_config_path, resolve_storage_dir, LoggingConfig, RemoteSettings, TomlConfig,
};
use menuboard_sync::{DisplayAddress, FileStorage, HttpTransport, SyncEngine, TabChannel};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for menuboard-sync
#[derive(Parser, Debug)]
#[command(name = "menuboard-sync")]
#[command(about = "Menu board state synchronization daemon")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MENUBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the persisted document
    #[arg(short, long, env = "MENUBOARD_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Remote endpoint (overrides the config file)
    #[arg(long, env = "MENUBOARD_ENDPOINT")]
    endpoint: Option<String>,

    /// Shared secret sent with remote requests
    #[arg(long, env = "MENUBOARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Run one forced sync, print a summary and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    let storage_dir = resolve_storage_dir(args.storage_dir.as_deref(), &config);
    info!("Storage directory: {}", storage_dir.display());
    let storage = FileStorage::open(&storage_dir)
        .with_context(|| format!("Failed to open storage at {}", storage_dir.display()))?;

    let channel = TabChannel::new(config.channel_name.clone());
    let mut builder = SyncEngine::builder()
        .storage(Arc::new(storage))
        .storage_key(config.storage_key.clone())
        .channel(&channel);

    let mut remote = config.remote.clone();
    if let Some(endpoint) = args.endpoint {
        remote.endpoint = endpoint;
    }
    if let Some(token) = args.token {
        remote.token = Some(token);
    }
    match RemoteSettings::from_section(&remote) {
        Some(settings) => {
            info!("Remote endpoint: {}", settings.endpoint);
            let transport = HttpTransport::new().context("Failed to create HTTP client")?;
            builder = builder.remote(settings, Arc::new(transport));
        }
        None => warn!("No remote endpoint configured, running local-only"),
    }

    let engine = builder.build();

    if args.once {
        let synced = engine.sync_from_remote(true).await.is_some();
        engine.wait_for_pushes().await;
        print_summary(&engine, &config, synced);
        return Ok(());
    }

    let subscription = engine.subscribe_restaurants(|list| {
        let names: Vec<&str> = list.restaurants.iter().map(|r| r.name.as_str()).collect();
        info!(active = %list.active_restaurant_id, "Restaurants: {}", names.join(", "));
    });
    if let Some(url) = display_url(&engine, &config) {
        info!("Display link for the active board: {}", url);
    }

    let tasks = engine.spawn_background();
    info!("Sync running with {} background tasks", tasks.len());

    shutdown_signal().await;

    tasks.shutdown();
    subscription.unsubscribe();
    engine.wait_for_pushes().await;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "menuboard_sync={level},menuboard_common={level}",
            level = logging.level
        ))
    });

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

fn display_url(engine: &SyncEngine, config: &TomlConfig) -> Option<String> {
    let base = config.display.base_url.as_deref()?;
    let view = engine.resolve_display(&DisplayAddress::default())?;
    let address = DisplayAddress::for_board(view.restaurant_id, view.board_id)
        .with_key(config.display.display_key.clone());
    match address.to_url(base) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(error = %e, "Unable to build display link");
            None
        }
    }
}

fn print_summary(engine: &SyncEngine, config: &TomlConfig, synced: bool) {
    let restaurants = engine.get_restaurants(true, false);
    let status = engine.remote_status();

    println!("Remote sync: {}", if synced { "ok" } else if status.enabled { "failed" } else { "disabled" });
    println!("Local store: {:?}", engine.status());
    for restaurant in &restaurants.restaurants {
        let marker = if restaurant.id == restaurants.active_restaurant_id { "*" } else { " " };
        println!("{} {} ({} boards)", marker, restaurant.name, restaurant.board_count);
        for board in restaurant.boards.iter().flatten() {
            let marker = if board.id == restaurant.active_board_id { "*" } else { " " };
            println!("    {} {} [{}]", marker, board.name, board.id);
        }
    }
    if let Some(url) = display_url(engine, config) {
        println!("Display: {}", url);
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
