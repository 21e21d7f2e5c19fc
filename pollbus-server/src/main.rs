//! Pollbus Server
//!
//! A multi-tenant notification bus behind an HTTP long-poll endpoint.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use pollbus_core::config::BusConfig;
use pollbus_core::dispatch::PollDispatcher;
use pollbus_core::publish::NotificationPublisher;
use server::{build_router, run_server};
use shutdown::shutdown_signal;
use sqlx::postgres::PgPoolOptions;
use state::{AppState, AuthConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Pollbus - long-poll notification bus server
#[derive(Parser, Debug)]
#[command(name = "pollbus-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./pollbus-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting pollbus-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let file_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = file_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool. Long polls release their
    // connection before suspending, so the pool stays this small no
    // matter how many pollers are idle.
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Build the bus services
    let bus_config = BusConfig::new(Duration::from_secs(file_config.bus.poll_timeout_secs));
    let dispatcher = Arc::new(PollDispatcher::new(db_pool.clone(), bus_config));
    let publisher = NotificationPublisher::new(dispatcher.store().clone());

    // Start the background tasks (cross-process waker, GC sweeper)
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let background_tasks = dispatcher.start(shutdown_rx);

    // Create application state and router
    let auth = AuthConfig::from_file(&file_config);
    let state = AppState::new(Arc::clone(&dispatcher), publisher, auth);
    let router = build_router(state);

    // Run the server. On a shutdown signal, stop the dispatcher first so
    // suspended long polls resolve and the connection drain is quick.
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let dispatcher_for_shutdown = Arc::clone(&dispatcher);
    let result = run_server(router, listen_addr, async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
        dispatcher_for_shutdown.stop();
    })
    .await;

    // Wait for the background tasks to finish
    for task in background_tasks {
        let _ = task.await;
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
