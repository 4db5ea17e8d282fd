//! Wire types for the daemon's HTTP API.

use crate::types::Reading;
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/reading/draw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawResponse {
    pub card_name: String,
    pub image_path: String,
    /// Echoed back so a first-time caller can persist its device token.
    pub device_id: String,
}

/// Body of `POST /v1/reading/interpret`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpretRequest {
    pub card_name: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub reflection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpretResponse {
    pub interpretation: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub readings: Vec<Reading>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub cards_in_catalog: usize,
}

/// Body of `POST /v1/admin/sweep`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRequest {
    /// Inactivity horizon in days; the daemon's configured default applies
    /// when omitted.
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    pub threads_removed: usize,
}
