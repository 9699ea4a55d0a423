//! Vetrina kernel
//!
//! HTTP server, scheduler tick and database migrations.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vetrina_kernel::{AppState, Config, db, routes};

#[derive(Debug, Parser)]
#[command(name = "vetrina", version, about = "Page publishing and versioning engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Run one scheduler tick and print its summary as JSON.
    Tick,
    /// Apply database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Tick => tick(config).await,
        Command::Migrate => migrate(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!(port = config.port, "Starting Vetrina kernel");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let app = routes::app(state)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(build_cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn tick(config: Config) -> Result<()> {
    if config.database_url.is_none() {
        warn!("DATABASE_URL not set, the tick runs against an empty in-memory store");
    }
    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let summary = state.scheduler().run().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("failed to encode tick summary")?
    );
    Ok(())
}

async fn migrate(config: Config) -> Result<()> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;
    let pool = db::create_pool(url, 1).await?;
    db::run_migrations(&pool).await?;
    info!("Migrations applied");
    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
