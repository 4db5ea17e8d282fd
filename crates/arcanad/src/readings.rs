//! Reading lifecycle manager.
//!
//! Coordinates the two phases of a reading: draw (create an open reading,
//! return a card) and interpret (generate prose, close the matching open
//! reading). All persistence goes through the session store as intent-level
//! operations; reading state is never cached in memory between calls.

use crate::catalog;
use crate::oracle::Oracle;
use crate::store::SessionStore;
use crate::telemetry::Telemetry;
use arcana_common::{NewReading, Reading, ReadingError, Thread, ThreadStats};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// What the draw phase hands back to the caller.
#[derive(Debug, Clone)]
pub struct DrawnCard {
    pub card_name: String,
    pub image_path: String,
}

pub struct ReadingService {
    store: Arc<SessionStore>,
    oracle: Arc<dyn Oracle>,
    telemetry: Arc<Telemetry>,
}

impl ReadingService {
    pub fn new(store: Arc<SessionStore>, oracle: Arc<dyn Oracle>, telemetry: Arc<Telemetry>) -> Self {
        Self {
            store,
            oracle,
            telemetry,
        }
    }

    /// Draw a card uniformly at random and persist the open reading.
    ///
    /// Draw and persist are one logical unit: if the store write fails the
    /// caller gets no card, since the interpret phase would have nothing to
    /// attach to.
    pub async fn draw_card(
        &self,
        thread_id: &str,
        question: &str,
    ) -> Result<DrawnCard, ReadingError> {
        let card = catalog::draw();

        // An internally drawn card missing from the catalog is a
        // catalog/selection desync and must never be persisted.
        let Some(_image_file) = catalog::lookup(card) else {
            error!("Drawn card {card} has no catalog entry");
            self.telemetry
                .record_error(thread_id, "drawn card missing from catalog", "catalog_desync");
            return Err(ReadingError::UnknownCard(card.to_string()));
        };

        self.store
            .create_reading(NewReading {
                thread_id: thread_id.to_string(),
                question: question.to_string(),
                card_drawn: card.to_string(),
            })
            .await?;

        self.telemetry.record_reading_drawn();
        info!("Drew card: {card}");

        Ok(DrawnCard {
            card_name: card.to_string(),
            image_path: format!("/v1/cards/{card}/image"),
        })
    }

    /// Generate an interpretation and close the matching open reading.
    ///
    /// The close is scoped by thread + card + still-open, so a retry after
    /// the reading was already closed affects zero rows; the text is still
    /// returned to the caller. An oracle failure leaves the reading open
    /// for a later retry.
    pub async fn interpret(
        &self,
        thread_id: &str,
        card_name: &str,
        question: &str,
        reflection: &str,
    ) -> Result<String, ReadingError> {
        let session_id = Uuid::new_v4().to_string();

        if !catalog::contains(card_name) {
            self.telemetry.record_error(
                &session_id,
                &format!("invalid card name: {card_name}"),
                "card_validation",
            );
            return Err(ReadingError::InvalidCard(card_name.to_string()));
        }

        let interpretation = self
            .oracle
            .interpret(card_name, question, reflection)
            .await
            .map_err(|e| {
                self.telemetry
                    .record_error(&session_id, &e.to_string(), "card_interpretation");
                ReadingError::Oracle(e.to_string())
            })?;

        let affected = self
            .store
            .close_open_reading(thread_id, card_name, reflection, &interpretation)
            .await
            .map_err(|e| {
                self.telemetry
                    .record_error(&session_id, &e.to_string(), "close_reading");
                ReadingError::from(e)
            })?;

        if affected == 0 {
            // Already closed by a concurrent or earlier call, or never
            // drawn on this thread. Not an error.
            debug!("No open reading matched {card_name} on thread {thread_id}");
        }

        self.telemetry.record_completion(&session_id, card_name);
        Ok(interpretation)
    }

    /// Readings for a thread, newest first.
    pub async fn history(&self, thread_id: &str) -> Result<Vec<Reading>, ReadingError> {
        Ok(self.store.list_readings(thread_id).await?)
    }

    /// Aggregate statistics for a thread; a fresh thread yields
    /// `{0, None}` rather than an error.
    pub async fn thread_statistics(&self, thread: &Thread) -> Result<ThreadStats, ReadingError> {
        let (total_readings, last_reading_date) =
            self.store.count_and_last_date(&thread.id).await?;
        Ok(ThreadStats {
            total_readings,
            last_reading_date,
            thread_created: thread.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::fakes::{FailingOracle, FixedOracle};
    use tempfile::tempdir;

    async fn service_with(
        oracle: Arc<dyn Oracle>,
    ) -> (tempfile::TempDir, Arc<SessionStore>, ReadingService) {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path().join("test.db")).await.unwrap());
        let service = ReadingService::new(
            Arc::clone(&store),
            oracle,
            Arc::new(Telemetry::new().unwrap()),
        );
        (dir, store, service)
    }

    #[tokio::test]
    async fn draw_persists_an_open_reading() {
        let (_dir, store, service) =
            service_with(Arc::new(FixedOracle("a new journey".into()))).await;
        let thread = store.create_thread("abc").await.unwrap();

        let drawn = service.draw_card(&thread.id, "will I succeed?").await.unwrap();
        assert!(catalog::contains(&drawn.card_name));
        assert!(drawn.image_path.contains("/image"));

        let readings = store.list_readings(&thread.id).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].card_drawn, drawn.card_name);
        assert_eq!(readings[0].question, "will I succeed?");
        assert!(readings[0].is_open());
    }

    #[tokio::test]
    async fn interpret_closes_the_open_reading() {
        let (_dir, store, service) =
            service_with(Arc::new(FixedOracle("a new journey".into()))).await;
        let thread = store.create_thread("abc").await.unwrap();
        store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: "will I succeed?".to_string(),
                card_drawn: "The Fool".to_string(),
            })
            .await
            .unwrap();

        let text = service
            .interpret(&thread.id, "The Fool", "will I succeed?", "I feel hopeful")
            .await
            .unwrap();
        assert_eq!(text, "a new journey");

        let readings = store.list_readings(&thread.id).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].reflection.as_deref(), Some("I feel hopeful"));
        assert_eq!(readings[0].interpretation.as_deref(), Some("a new journey"));
    }

    #[tokio::test]
    async fn repeat_interpret_returns_text_without_touching_the_store() {
        let (_dir, store, service) =
            service_with(Arc::new(FixedOracle("first text".into()))).await;
        let thread = store.create_thread("abc").await.unwrap();
        store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: String::new(),
                card_drawn: "The Fool".to_string(),
            })
            .await
            .unwrap();

        service
            .interpret(&thread.id, "The Fool", "", "I feel hopeful")
            .await
            .unwrap();

        // Client retry after the reading was already closed
        let text = service
            .interpret(&thread.id, "The Fool", "", "second reflection")
            .await
            .unwrap();
        assert_eq!(text, "first text");

        let readings = store.list_readings(&thread.id).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].reflection.as_deref(), Some("I feel hopeful"));
    }

    #[tokio::test]
    async fn invalid_card_fails_without_store_mutation() {
        let (_dir, store, service) =
            service_with(Arc::new(FixedOracle("unused".into()))).await;
        let thread = store.create_thread("abc").await.unwrap();
        store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: String::new(),
                card_drawn: "The Fool".to_string(),
            })
            .await
            .unwrap();

        let err = service
            .interpret(&thread.id, "Not A Real Card", "", "reflection")
            .await
            .unwrap_err();
        assert!(matches!(err, ReadingError::InvalidCard(_)));

        let readings = store.list_readings(&thread.id).await.unwrap();
        assert!(readings[0].is_open());
    }

    #[tokio::test]
    async fn oracle_failure_leaves_the_reading_open_for_retry() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path().join("test.db")).await.unwrap());
        let thread = store.create_thread("abc").await.unwrap();
        store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: String::new(),
                card_drawn: "The Fool".to_string(),
            })
            .await
            .unwrap();

        let failing = ReadingService::new(
            Arc::clone(&store),
            Arc::new(FailingOracle),
            Arc::new(Telemetry::new().unwrap()),
        );
        let err = failing
            .interpret(&thread.id, "The Fool", "", "reflection")
            .await
            .unwrap_err();
        assert!(matches!(err, ReadingError::Oracle(_)));

        let readings = store.list_readings(&thread.id).await.unwrap();
        assert!(readings[0].is_open());

        // A later successful call can still close it
        let working = ReadingService::new(
            Arc::clone(&store),
            Arc::new(FixedOracle("recovered".into())),
            Arc::new(Telemetry::new().unwrap()),
        );
        working
            .interpret(&thread.id, "The Fool", "", "reflection")
            .await
            .unwrap();
        let readings = store.list_readings(&thread.id).await.unwrap();
        assert_eq!(readings[0].interpretation.as_deref(), Some("recovered"));
    }

    #[tokio::test]
    async fn concurrent_interprets_close_exactly_one_reading() {
        let (_dir, store, service) =
            service_with(Arc::new(FixedOracle("text".into()))).await;
        let service = Arc::new(service);
        let thread = store.create_thread("abc").await.unwrap();
        store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: String::new(),
                card_drawn: "The Fool".to_string(),
            })
            .await
            .unwrap();

        let a = {
            let service = Arc::clone(&service);
            let thread_id = thread.id.clone();
            tokio::spawn(async move {
                service
                    .interpret(&thread_id, "The Fool", "", "first")
                    .await
                    .unwrap()
            })
        };
        let b = {
            let service = Arc::clone(&service);
            let thread_id = thread.id.clone();
            tokio::spawn(async move {
                service
                    .interpret(&thread_id, "The Fool", "", "second")
                    .await
                    .unwrap()
            })
        };

        // Both callers get text back; exactly one write landed
        a.await.unwrap();
        b.await.unwrap();

        let readings = store.list_readings(&thread.id).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert!(!readings[0].is_open());
    }

    #[tokio::test]
    async fn empty_reflection_still_reaches_the_oracle() {
        let (_dir, store, service) =
            service_with(Arc::new(FixedOracle("text".into()))).await;
        let thread = store.create_thread("abc").await.unwrap();
        store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: String::new(),
                card_drawn: "The Sun".to_string(),
            })
            .await
            .unwrap();

        let text = service.interpret(&thread.id, "The Sun", "", "").await.unwrap();
        assert_eq!(text, "text");

        let readings = store.list_readings(&thread.id).await.unwrap();
        assert!(!readings[0].is_open());
    }

    #[tokio::test]
    async fn statistics_reflect_reading_counts() {
        let (_dir, store, service) =
            service_with(Arc::new(FixedOracle("text".into()))).await;
        let thread = store.create_thread("abc").await.unwrap();

        let fresh = service.thread_statistics(&thread).await.unwrap();
        assert_eq!(fresh.total_readings, 0);
        assert!(fresh.last_reading_date.is_none());
        assert_eq!(fresh.thread_created, thread.created_at);

        service.draw_card(&thread.id, "").await.unwrap();
        let stats = service.thread_statistics(&thread).await.unwrap();
        assert_eq!(stats.total_readings, 1);
        assert!(stats.last_reading_date.is_some());
    }
}
