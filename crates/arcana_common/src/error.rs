//! Error taxonomy for the reading lifecycle.

use thiserror::Error;

/// Failures a reading operation can surface.
///
/// Only `StoreUnavailable` during the draw phase aborts a request hard;
/// everything else degrades to a user-facing message at the transport layer.
#[derive(Error, Debug)]
pub enum ReadingError {
    /// Persistence is unreachable. No partial state is exposed to the caller.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    /// The caller supplied a card name outside the catalog.
    #[error("invalid card: {0}")]
    InvalidCard(String),

    /// An internally drawn card has no catalog entry. This is a
    /// catalog/selection desync, not a user error.
    #[error("drawn card missing from catalog: {0}")]
    UnknownCard(String),

    /// The interpretation oracle errored or timed out. The reading stays
    /// open so a retry can still close it.
    #[error("oracle failure: {0}")]
    Oracle(String),
}
