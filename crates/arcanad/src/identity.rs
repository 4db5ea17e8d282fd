//! Maps an opaque device token to a durable thread.

use crate::store::SessionStore;
use arcana_common::{ReadingError, Thread};
use std::sync::Arc;
use tracing::info;

/// Resolves inbound device tokens to threads, creating one on first contact.
///
/// Token generation for callers that arrive without one is the transport
/// layer's job; this component always receives a non-empty token.
pub struct IdentityResolver {
    store: Arc<SessionStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Look up the thread for a device token, touching last_active; create
    /// one if the device has never been seen.
    pub async fn resolve(&self, device_token: &str) -> Result<Thread, ReadingError> {
        if let Some(mut thread) = self.store.find_thread_by_device(device_token).await? {
            thread.last_active = self.store.touch_thread(&thread.id).await?;
            return Ok(thread);
        }

        match self.store.create_thread(device_token).await {
            Ok(thread) => {
                info!("Created thread {} for new device", thread.id);
                Ok(thread)
            }
            // Lost a creation race against a concurrent first request for
            // the same device; the winner's thread is the thread.
            Err(err) if err.is_unique_violation() => {
                let mut thread = self
                    .store
                    .find_thread_by_device(device_token)
                    .await?
                    .ok_or_else(|| ReadingError::StoreUnavailable(err.to_string()))?;
                thread.last_active = self.store.touch_thread(&thread.id).await?;
                Ok(thread)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn resolver() -> (tempfile::TempDir, IdentityResolver) {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("test.db")).await.unwrap();
        (dir, IdentityResolver::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn unseen_token_creates_exactly_one_thread() {
        let (_dir, resolver) = resolver().await;

        let first = resolver.resolve("device-abc").await.unwrap();
        let second = resolver.resolve("device-abc").await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.last_active >= first.last_active);
    }

    #[tokio::test]
    async fn distinct_tokens_get_distinct_threads() {
        let (_dir, resolver) = resolver().await;

        let a = resolver.resolve("device-a").await.unwrap();
        let b = resolver.resolve("device-b").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn concurrent_first_contact_yields_one_thread() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path().join("test.db")).await.unwrap());
        let resolver = Arc::new(IdentityResolver::new(Arc::clone(&store)));

        let a = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.resolve("device-abc").await.unwrap() })
        };
        let b = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.resolve("device-abc").await.unwrap() })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.id, b.id);
    }
}
