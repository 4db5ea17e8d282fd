//! Arcana Daemon - tarot reading session service
//!
//! Binds anonymous devices to durable threads, tracks draw/interpret
//! reading cycles, and delegates interpretation prose to an external
//! oracle.

use anyhow::Result;
use arcanad::config::DaemonConfig;
use arcanad::identity::IdentityResolver;
use arcanad::images::CardImageCache;
use arcanad::oracle::{HttpOracle, Oracle};
use arcanad::readings::ReadingService;
use arcanad::server::AppState;
use arcanad::store::SessionStore;
use arcanad::telemetry::Telemetry;
use arcanad::{catalog, server, sweeper};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Arcana Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = DaemonConfig::load();

    let store = Arc::new(SessionStore::open(&config.db_path).await?);
    let oracle: Arc<dyn Oracle> = Arc::new(HttpOracle::new(config.oracle.clone())?);
    let telemetry = Arc::new(Telemetry::new()?);

    let resolver = IdentityResolver::new(Arc::clone(&store));
    let readings = ReadingService::new(
        Arc::clone(&store),
        Arc::clone(&oracle),
        Arc::clone(&telemetry),
    );
    let images = CardImageCache::new(&config.card_image_dir);

    info!("Catalog ready with {} cards", catalog::size());

    sweeper::spawn(Arc::clone(&store), config.retention.clone());

    let state = AppState {
        resolver,
        readings,
        images,
        store,
        telemetry,
        retention: config.retention.clone(),
        start_time: Instant::now(),
    };

    server::run(state, &config.bind_addr).await
}
