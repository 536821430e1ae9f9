//! Userbase API Server
//!
//! REST API server for account registration, login and profile management.

use std::sync::Arc;
use userbase_api::{create_router, state::AppState};
use userbase_core::{AppConfig, LoggingConfig, MemoryAccountStore};

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("userbase_api={0},userbase_core={0},audit=info,tower_http=debug", logging.level)
            .into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.logging);

    let addr = config.bind_addr();

    // A missing signing secret is fatal here
    let state = Arc::new(AppState::new(&config, Arc::new(MemoryAccountStore::new()))?);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Userbase API Server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
