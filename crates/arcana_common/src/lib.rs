//! Shared types for the arcana daemon and its CLI client.

pub mod api;
pub mod error;
pub mod types;

pub use api::{
    DrawRequest, DrawResponse, HealthResponse, HistoryResponse, InterpretRequest,
    InterpretResponse, SweepRequest, SweepResponse,
};
pub use error::ReadingError;
pub use types::{NewReading, Reading, Thread, ThreadStats};
