//! OrderCache server binary
//!
//! # Examples
//!
//! ```bash
//! # Serve lookups, ingesting orders from a file (one JSON document per line)
//! ordercache serve --data-dir data/orders --input orders.jsonl
//!
//! # Ingest from stdin
//! producer | ordercache serve --data-dir data/orders --input -
//!
//! # Show the effective configuration
//! ordercache --config ordercache.toml config
//! ```

use clap::{Args, Parser, Subcommand};
use ordercache::config::{AppConfig, LoggingConfig, StorageBackend};
use ordercache::storage::ItemPolicy;
use std::future::Future;
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// OrderCache - order ingestion with a sharded write-through cache
#[derive(Parser, Debug)]
#[command(name = "ordercache")]
#[command(version = ordercache::VERSION)]
#[command(about = "Order ingestion service with a sharded write-through cache", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, global = true, env = "ORDERCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for daily rolling log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the service
    Serve(ServeArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// HTTP bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Order input: a file with one JSON order per line, or `-` for stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Data directory; selects the file-backed store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Treatment of item rows on re-delivery
    #[arg(long, value_parser = parse_item_policy)]
    item_policy: Option<ItemPolicy>,

    /// Skip loading recent orders into the cache at startup
    #[arg(long)]
    no_warmup: bool,
}

fn parse_item_policy(value: &str) -> Result<ItemPolicy, String> {
    match value {
        "insert_if_absent" => Ok(ItemPolicy::InsertIfAbsent),
        "append" => Ok(ItemPolicy::Append),
        other => Err(format!(
            "unknown item policy '{}', expected insert_if_absent or append",
            other
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    apply_global_flags(&mut config, &cli);

    match cli.command {
        Commands::Serve(args) => {
            apply_serve_flags(&mut config, args);
            config.validate()?;
            setup_logging(&config.logging)?;
            serve_command(config).await
        }
        Commands::Config => {
            config.validate()?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn apply_global_flags(config: &mut AppConfig, cli: &Cli) {
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.dir = Some(dir.clone());
    }
    if cli.no_color {
        config.logging.no_color = true;
    }
}

fn apply_serve_flags(config: &mut AppConfig, args: ServeArgs) {
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(input) = args.input {
        config.ingest.input = Some(input);
    }
    if let Some(dir) = args.data_dir {
        config.storage.backend = StorageBackend::File;
        config.storage.path = Some(dir);
    }
    if let Some(policy) = args.item_policy {
        config.storage.item_policy = policy;
    }
    if args.no_warmup {
        config.warmup.enabled = false;
    }
}

/// Console output plus optional daily rolling files
fn setup_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_level = logging
        .level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    let file_layer = match &logging.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "ordercache.log");
            Some(fmt::layer().with_writer(file_appender).with_ansi(false))
        }
        None => None,
    };

    let (json_layer, pretty_layer) = if logging.json {
        (Some(fmt::layer().json().with_writer(std::io::stdout)), None)
    } else {
        (
            None,
            Some(
                fmt::layer()
                    .with_writer(std::io::stdout)
                    .with_ansi(!logging.no_color)
                    .pretty(),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer)
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

async fn serve_command(config: AppConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    ordercache::app::run(config, shutdown).await.map_err(|e| {
        error!(error = %e, "OrderCache failed");
        e.into()
    })
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = signal_or_pending("Ctrl+C", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = signal_or_pending("SIGTERM", async {
        let mut sig = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        sig.recv().await;
        Ok::<(), std::io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// Resolve when `signal` fires; park forever if its handler failed to install
async fn signal_or_pending<F>(name: &str, installed: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(err) = installed.await {
        error!("failed to install {} handler: {}", name, err);
        std::future::pending::<()>().await;
    }
}
