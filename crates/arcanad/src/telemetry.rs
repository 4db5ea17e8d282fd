//! Observability collaborator for the reading flow.
//!
//! Fire-and-forget: recording never blocks and never fails the primary flow.
//! Counters are exposed on /metrics; details go to the log stream.

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::{debug, warn};

pub struct Telemetry {
    registry: Registry,
    readings_drawn: IntCounter,
    interpretations_completed: IntCounter,
    errors: IntCounterVec,
}

impl Telemetry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let readings_drawn = IntCounter::new(
            "arcanad_readings_drawn_total",
            "Cards drawn and persisted as open readings",
        )?;
        let interpretations_completed = IntCounter::new(
            "arcanad_interpretations_completed_total",
            "Interpretations successfully generated",
        )?;
        let errors = IntCounterVec::new(
            Opts::new("arcanad_errors_total", "Errors recorded by context"),
            &["context"],
        )?;

        registry.register(Box::new(readings_drawn.clone()))?;
        registry.register(Box::new(interpretations_completed.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Self {
            registry,
            readings_drawn,
            interpretations_completed,
            errors,
        })
    }

    pub fn record_reading_drawn(&self) {
        self.readings_drawn.inc();
    }

    pub fn record_completion(&self, session_id: &str, card_name: &str) {
        self.interpretations_completed.inc();
        debug!(session_id, card_name, "interpretation completed");
    }

    pub fn record_error(&self, session_id: &str, error: &str, context: &str) {
        self.errors.with_label_values(&[context]).inc();
        warn!(session_id, context, "reading error: {error}");
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!("Failed to encode metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
