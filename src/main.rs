//! statuswatch server entry point.

use statuswatch::alert::{notifier_from_config, AlertDispatcher, InMemoryCooldowns};
use statuswatch::config::ServerConfig;
use statuswatch::db::Store;
use statuswatch::probe;
use statuswatch::scheduler::Scheduler;
use statuswatch::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("statuswatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting statuswatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);
    if cfg.dev_mode {
        tracing::warn!("Dev mode: trigger endpoint accepts unauthenticated requests");
    } else if cfg.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET not set: trigger endpoint will reject every request");
    }

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Probes and alerting
    let probes = probe::build_probes(&cfg, &store)?;
    let notifier = notifier_from_config(&cfg, reqwest::Client::new());
    let dispatcher = Arc::new(AlertDispatcher::new(notifier, Arc::new(InMemoryCooldowns::new())));

    // Start scheduler
    let scheduler = Arc::new(Scheduler::new(store.clone(), probes, dispatcher));
    scheduler.start(cfg.check_interval);

    // Start web server
    let server = Server::new(cfg, store, scheduler.clone());
    server.start().await?;

    scheduler.stop().await;
    Ok(())
}
