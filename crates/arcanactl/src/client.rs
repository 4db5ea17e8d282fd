//! HTTP client for communicating with arcanad.

use anyhow::{anyhow, Context, Result};
use arcana_common::{
    DrawRequest, DrawResponse, HealthResponse, HistoryResponse, InterpretRequest,
    InterpretResponse, SweepRequest, SweepResponse, ThreadStats,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7471";

/// Header carrying the opaque per-device token.
const DEVICE_ID_HEADER: &str = "x-device-id";

/// Client for communicating with arcanad.
///
/// The device token is persisted under the user's data directory so
/// consecutive invocations land on the same thread.
pub struct ArcanaClient {
    base_url: String,
    device_id: String,
    http: reqwest::Client,
}

impl ArcanaClient {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            device_id: load_or_create_device_id()?,
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(DEVICE_ID_HEADER, &self.device_id)
            .send()
            .await
            .map_err(connect_hint)?;
        decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(DEVICE_ID_HEADER, &self.device_id)
            .json(body)
            .send()
            .await
            .map_err(connect_hint)?;
        decode(response).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("/v1/health").await
    }

    pub async fn draw(&self, question: &str) -> Result<DrawResponse> {
        self.post_json(
            "/v1/reading/draw",
            &DrawRequest {
                question: question.to_string(),
            },
        )
        .await
    }

    pub async fn interpret(
        &self,
        card_name: &str,
        question: &str,
        reflection: &str,
    ) -> Result<InterpretResponse> {
        self.post_json(
            "/v1/reading/interpret",
            &InterpretRequest {
                card_name: card_name.to_string(),
                question: question.to_string(),
                reflection: reflection.to_string(),
            },
        )
        .await
    }

    pub async fn history(&self) -> Result<HistoryResponse> {
        self.get_json("/v1/reading/history").await
    }

    pub async fn stats(&self) -> Result<ThreadStats> {
        self.get_json("/v1/reading/stats").await
    }

    pub async fn sweep(&self, days: Option<i64>) -> Result<SweepResponse> {
        self.post_json("/v1/admin/sweep", &SweepRequest { days }).await
    }
}

fn connect_hint(e: reqwest::Error) -> anyhow::Error {
    if e.is_connect() {
        anyhow!(
            "Cannot reach the arcana daemon: {e}\n\n\
             Is arcanad running? Start it and try again."
        )
    } else {
        anyhow!("Request failed: {e}")
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Daemon returned {status}: {body}"));
    }
    response
        .json()
        .await
        .context("Failed to decode daemon response")
}

fn device_id_path() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| anyhow!("Could not determine user data directory"))?;
    Ok(base.join("arcana").join("device_id"))
}

/// Load the persisted device token, minting one on first run.
fn load_or_create_device_id() -> Result<String> {
    let path = device_id_path()?;

    if let Ok(existing) = std::fs::read_to_string(&path) {
        let token = existing.trim().to_string();
        if !token.is_empty() {
            return Ok(token);
        }
    }

    let token = Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }
    std::fs::write(&path, &token).context("Failed to persist device token")?;
    Ok(token)
}
