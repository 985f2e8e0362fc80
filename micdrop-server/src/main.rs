//! Micdrop party server - main entry point
//!
//! Hosts durable karaoke party queues behind a REST + SSE API: one
//! actor task per party, state persisted to SQLite, fair-rotation
//! queue assembly on every read and broadcast.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use micdrop_server::api;
use micdrop_server::catalog::{Catalog, HttpCatalog};
use micdrop_server::config::{Config, ConfigOverrides};
use micdrop_server::db;
use micdrop_server::party::PartyRegistry;

/// Command-line arguments for micdrop-server
#[derive(Parser, Debug)]
#[command(name = "micdrop-server")]
#[command(about = "Micdrop party server: durable karaoke queues with fair rotation")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "MICDROP_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "MICDROP_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MICDROP_PORT")]
    port: Option<u16>,

    /// Path to the SQLite database file
    #[arg(short, long, env = "MICDROP_DATABASE")]
    database: Option<PathBuf>,

    /// Seconds of inactivity before a party expires
    #[arg(long, env = "MICDROP_PARTY_TTL_SECONDS")]
    party_ttl_seconds: Option<u64>,

    /// Base URL of the catalog backend (search + track matching)
    #[arg(long, env = "MICDROP_CATALOG_URL")]
    catalog_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "micdrop_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let overrides = ConfigOverrides {
        host: args.host,
        port: args.port,
        database_path: args.database,
        party_ttl_seconds: args.party_ttl_seconds,
        catalog_url: args.catalog_url,
    };
    let config = Config::load(args.config.as_deref(), overrides)
        .context("Failed to load configuration")?;

    info!("Starting Micdrop party server on port {}", config.port);
    info!("Database: {}", config.database_path.display());
    info!(
        "Party expiry window: {}s of inactivity",
        config.party_ttl_seconds
    );

    // Open the database and ensure the schema exists
    let pool = db::connect(&config.database_path)
        .await
        .context("Failed to open database")?;
    db::init::initialize_database(&pool)
        .await
        .context("Failed to initialize database schema")?;
    info!("Database ready");

    // Catalog backend is optional; without it, search returns 503 and
    // added songs keep their raw titles.
    let catalog: Option<Arc<dyn Catalog>> = match config.catalog_url.as_deref() {
        Some(url) => {
            info!("Catalog backend: {}", url);
            let catalog = HttpCatalog::new(url).context("Failed to build catalog client")?;
            Some(Arc::new(catalog))
        }
        None => {
            info!("No catalog backend configured");
            None
        }
    };

    let registry = PartyRegistry::new(
        pool,
        catalog.clone(),
        config.party_ttl(),
        config.broadcast_capacity,
    );
    registry.spawn_sweeper();

    // Build the application router
    let app = api::create_router(api::AppState {
        registry,
        catalog,
    });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
