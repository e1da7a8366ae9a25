// src/main.rs

use std::sync::Arc;

use dotenvy::dotenv;
use lessons_frontend::backend::{Backend, GatewayClient, MemoryBackend};
use lessons_frontend::cache::SqliteCache;
use lessons_frontend::config::Config;
use lessons_frontend::error::AppError;
use lessons_frontend::routes;
use lessons_frontend::state::AppState;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "frontend.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    if let Err(e) = run(config).await {
        tracing::error!("Front-end stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), AppError> {
    // Device-local answer cache
    let cache = SqliteCache::connect(&config.cache_database_url).await?;
    tracing::info!("Local cache ready at {}", config.cache_database_url);

    let backend = match &config.backend_url {
        Some(url) => {
            let http = reqwest::Client::new();
            let gateway = GatewayClient::new(http, url, &config.backend_anon_key)?;
            tracing::info!("Using backend at {}", gateway.base_url());
            Backend::from_shared(Arc::new(gateway))
        }
        None => {
            tracing::warn!("BACKEND_URL not set, running against the in-memory backend");
            Backend::from_shared(Arc::new(MemoryBackend::new()))
        }
    };

    let state = AppState::build(config.clone(), backend, Arc::new(cache))?;
    let autosave = state.autosave.clone();

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| AppError::InternalServerError(format!("bind {}: {}", config.listen_addr, e)))?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    // Answers still waiting for their countdown are written before exit.
    let flushed = autosave.flush_all().await?;
    tracing::info!("Flushed {} pending answers on shutdown", flushed);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
