//! HTTP server for arcanad

use crate::config::RetentionConfig;
use crate::identity::IdentityResolver;
use crate::images::CardImageCache;
use crate::readings::ReadingService;
use crate::routes;
use crate::store::SessionStore;
use crate::telemetry::Telemetry;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub resolver: IdentityResolver,
    pub readings: ReadingService,
    pub images: CardImageCache,
    pub store: Arc<SessionStore>,
    pub telemetry: Arc<Telemetry>,
    pub retention: RetentionConfig,
    pub start_time: Instant,
}

/// Run the HTTP server
pub async fn run(state: AppState, bind_addr: &str) -> Result<()> {
    let state = Arc::new(state);

    let app = Router::new()
        .merge(routes::reading_routes())
        .merge(routes::card_routes())
        .merge(routes::health_routes())
        .merge(routes::admin_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("  Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
