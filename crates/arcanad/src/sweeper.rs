//! Background retention sweep.
//!
//! Time-based deletion of threads (and their readings) that have been
//! inactive past the configured horizon. Also triggerable out-of-band via
//! the admin route.

use crate::config::RetentionConfig;
use crate::store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the periodic sweep task. The first sweep runs at startup.
pub fn spawn(store: Arc<SessionStore>, retention: RetentionConfig) -> JoinHandle<()> {
    let period = Duration::from_secs(retention.sweep_interval_hours.max(1) * 3600);
    info!(
        "Retention sweep every {}h, horizon {} days",
        retention.sweep_interval_hours.max(1),
        retention.inactive_days
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match store.sweep_inactive_threads(retention.inactive_days).await {
                Ok(0) => debug!("Retention sweep: nothing to remove"),
                Ok(n) => info!("Retention sweep removed {n} inactive threads"),
                Err(e) => warn!("Retention sweep failed: {e}"),
            }
        }
    })
}
