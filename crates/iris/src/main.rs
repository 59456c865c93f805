//! IRIS Diagnosis API
//!
//! Main entry point for the iris server binary.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use iris_bridge::{WorkerBridge, WorkerConfig};
use iris_server::{Server, ServerConfig};
use iris_session::{SessionStore, StoreConfig};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// IRIS Diagnosis API - chronic kidney disease staging for cats
#[derive(Parser)]
#[command(name = "iris")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),
}

/// Arguments for the serve command.
///
/// CLI arguments override environment variables.
#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Interpreter that runs the worker script
    #[arg(long, env = "WORKER_EXECUTABLE", default_value = "python")]
    pub worker_executable: PathBuf,

    /// Worker script, relative to the worker directory
    #[arg(long, env = "WORKER_SCRIPT", default_value = "run_lg_api.py")]
    pub worker_script: PathBuf,

    /// Working directory for the worker process
    #[arg(long, env = "WORKER_DIR", default_value = ".")]
    pub worker_dir: PathBuf,

    /// Hard deadline for one worker exchange, in milliseconds
    #[arg(long, env = "WORKER_TIMEOUT_MS", default_value_t = 60_000)]
    pub worker_timeout_ms: u64,

    /// Allowed CORS origin, or `*` for any
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Maximum request body size, in bytes
    #[arg(long, env = "MAX_PAYLOAD_SIZE", default_value_t = 1024 * 1024)]
    pub max_payload_size: usize,

    /// Session idle lifetime, in seconds
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = 30 * 60)]
    pub session_ttl_secs: u64,

    /// Directory for rotating JSON log files (console only when unset)
    #[arg(long, env = "IRIS_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "iris=debug,iris_bridge=debug,iris_server=debug,iris_session=debug,tower_http=debug,info"
    } else {
        "iris=info,iris_bridge=info,iris_server=info,iris_session=info,warn"
    };

    match cli.command {
        Commands::Serve(args) => {
            let _guard = init_tracing(filter, args.log_dir.as_deref());
            serve(args).await
        }
    }
}

/// Initialize tracing: console layer, plus a rotating JSON file layer when a
/// log directory is given. The returned guard must outlive the server so the
/// file writer flushes on shutdown.
fn init_tracing(
    filter: &str,
    log_dir: Option<&std::path::Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(tracing_subscriber::EnvFilter::new(filter));

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "iris.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_filter(tracing_subscriber::EnvFilter::new(
                            "iris=debug,iris_bridge=debug,iris_server=debug,iris_session=debug,info",
                        )),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            None
        }
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let bridge = WorkerBridge::new(
        WorkerConfig::new()
            .with_executable(&args.worker_executable)
            .with_script(&args.worker_script)
            .with_working_dir(&args.worker_dir)
            .with_timeout(Duration::from_millis(args.worker_timeout_ms)),
    );

    let sessions = SessionStore::new(
        StoreConfig::new().with_ttl(Duration::from_secs(args.session_ttl_secs)),
    );
    let sweeper = sessions.spawn_sweeper();

    let config = ServerConfig::new()
        .with_bind_address(SocketAddr::new(args.host, args.port))
        .with_cors_origin(&args.cors_origin)
        .with_max_payload_size(args.max_payload_size);

    info!(
        addr = %config.bind_address,
        worker = %args.worker_executable.display(),
        script = %args.worker_script.display(),
        timeout_ms = args.worker_timeout_ms,
        "starting IRIS diagnosis API"
    );

    let server = Server::new(bridge, sessions, config);

    tokio::select! {
        result = server.run() => {
            result.context("server exited")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    sweeper.shutdown();
    Ok(())
}
