use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crm_translator::config::Config;
use crm_translator::db::Database;
use crm_translator::server::{app_router, AppState};
use crm_translator::store::{MemoryStore, TranslationStore};
use crm_translator::TranslationService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Load configuration from environment
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("crm_translator={}", config.log_level).parse()?),
        )
        .init();

    info!("Starting translation service");

    let store: Arc<dyn TranslationStore> = match &config.database_url {
        Some(url) => Arc::new(Database::new(url, config.database_max_connections).await?),
        None => {
            warn!("DATABASE_URL not set, translations are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(TranslationService::new(store));
    let app = app_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
