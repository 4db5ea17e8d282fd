//! API routes for arcanad
//!
//! Device identity rides in the x-device-id header; a caller arriving
//! without one is minted a fresh token, echoed back in every response so
//! the client can persist it. Interpret-phase failures degrade to a 200
//! with an apology; only an unreachable store during draw is a hard error.

use crate::images::ImageError;
use crate::prompts;
use crate::server::AppState;
use arcana_common::{
    DrawRequest, DrawResponse, HealthResponse, HistoryResponse, InterpretRequest,
    InterpretResponse, ReadingError, SweepRequest, SweepResponse, Thread, ThreadStats,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

type AppStateArc = Arc<AppState>;

/// Header carrying the opaque per-device token.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Token from the header, or a freshly minted one for first-time callers.
fn device_token(headers: &HeaderMap) -> String {
    headers
        .get(DEVICE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn resolve_thread(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Thread, String), (StatusCode, String)> {
    let device_id = device_token(headers);
    let thread = state.resolver.resolve(&device_id).await.map_err(|e| {
        error!("Failed to resolve thread: {e}");
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;
    Ok((thread, device_id))
}

// ============================================================================
// Reading Routes
// ============================================================================

pub fn reading_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/reading/draw", post(draw))
        .route("/v1/reading/interpret", post(interpret))
        .route("/v1/reading/history", get(history))
        .route("/v1/reading/stats", get(stats))
}

async fn draw(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(req): Json<DrawRequest>,
) -> Result<Json<DrawResponse>, (StatusCode, String)> {
    let (thread, device_id) = resolve_thread(&state, &headers).await?;

    let drawn = state
        .readings
        .draw_card(&thread.id, &req.question)
        .await
        .map_err(|e| match e {
            ReadingError::UnknownCard(_) => {
                error!("Catalog desync during draw: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            _ => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        })?;

    Ok(Json(DrawResponse {
        card_name: drawn.card_name,
        image_path: drawn.image_path,
        device_id,
    }))
}

async fn interpret(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(req): Json<InterpretRequest>,
) -> Result<Json<InterpretResponse>, (StatusCode, String)> {
    let (thread, device_id) = resolve_thread(&state, &headers).await?;

    let interpretation = match state
        .readings
        .interpret(&thread.id, &req.card_name, &req.question, &req.reflection)
        .await
    {
        Ok(text) => text,
        Err(ReadingError::InvalidCard(_)) => prompts::CARD_NOT_IDENTIFIED.to_string(),
        Err(e) => {
            // Conversational UX: the reading stays open for a retry and the
            // caller gets an apology, not a transport error.
            error!("Interpretation failed: {e}");
            prompts::READING_FAILED.to_string()
        }
    };

    Ok(Json(InterpretResponse {
        interpretation,
        device_id,
    }))
}

async fn history(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, (StatusCode, String)> {
    let (thread, _device_id) = resolve_thread(&state, &headers).await?;

    let readings = state.readings.history(&thread.id).await.map_err(|e| {
        error!("Failed to list readings: {e}");
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;

    Ok(Json(HistoryResponse { readings }))
}

async fn stats(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> Result<Json<ThreadStats>, (StatusCode, String)> {
    let (thread, _device_id) = resolve_thread(&state, &headers).await?;

    let stats = state.readings.thread_statistics(&thread).await.map_err(|e| {
        error!("Failed to compute thread statistics: {e}");
        (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;

    Ok(Json(stats))
}

// ============================================================================
// Card Routes
// ============================================================================

pub fn card_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/cards/:name/image", get(card_image))
}

async fn card_image(
    State(state): State<AppStateArc>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.images.get(&name).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes.to_vec())),
        Err(ImageError::UnknownCard(_)) => {
            Err((StatusCode::NOT_FOUND, format!("unknown card: {name}")))
        }
        Err(e) => {
            error!("Failed to load card image: {e}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/health", get(health_check))
        .route("/metrics", get(metrics))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        cards_in_catalog: crate::catalog::size(),
    })
}

async fn metrics(State(state): State<AppStateArc>) -> String {
    state.telemetry.render()
}

// ============================================================================
// Admin Routes
// ============================================================================

pub fn admin_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/admin/sweep", post(sweep))
}

/// Out-of-band retention sweep trigger.
async fn sweep(
    State(state): State<AppStateArc>,
    Json(req): Json<SweepRequest>,
) -> Result<Json<SweepResponse>, (StatusCode, String)> {
    let days = req.days.unwrap_or(state.retention.inactive_days);

    let threads_removed = state
        .store
        .sweep_inactive_threads(days)
        .await
        .map_err(|e| {
            error!("Retention sweep failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        })?;

    Ok(Json(SweepResponse { threads_removed }))
}
