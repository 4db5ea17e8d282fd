//! Domain records persisted by the session store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One anonymous device's ongoing conversation.
///
/// Exactly one thread exists per device token; `last_active` is touched on
/// every request and only ever moves forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// One draw-and-interpret cycle.
///
/// A reading is open while `interpretation` is null; closing it sets
/// `reflection` and `interpretation` together, exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub thread_id: String,
    pub question: String,
    pub card_drawn: String,
    pub reflection: Option<String>,
    pub interpretation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Reading {
    pub fn is_open(&self) -> bool {
        self.interpretation.is_none()
    }
}

/// Fields the draw step supplies when persisting a new reading.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub thread_id: String,
    pub question: String,
    pub card_drawn: String,
}

/// Aggregate statistics for one thread.
///
/// A brand-new thread reports `total_readings = 0` and no last reading date
/// rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadStats {
    pub total_readings: i64,
    pub last_reading_date: Option<DateTime<Utc>>,
    pub thread_created: DateTime<Utc>,
}
