use anyhow::Result;
use std::sync::Arc;

mod config;
mod error;
mod logging;
mod routes;
mod services;
pub mod models;

use services::campaign_store::CampaignStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::load_config()?;

    let store = CampaignStore::open(&config.database_path)?;
    let addr = config.socket_addr();

    // Build our application state
    let state = Arc::new(AppState::new(config, Arc::new(store)));
    let app = routes::app(state);

    // Run it
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Application state
pub struct AppState {
    config: config::Config,
    store: Arc<CampaignStore>,
}

impl AppState {
    fn new(config: config::Config, store: Arc<CampaignStore>) -> Self {
        Self { config, store }
    }
}
