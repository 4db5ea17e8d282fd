//! Durable session store for threads and readings.
//!
//! Sole writer of persisted state. The lifecycle manager issues intent-level
//! operations here; in particular, closing an open reading is a single
//! conditional UPDATE so two racing interpret calls cannot both write.

use arcana_common::{NewReading, Reading, ReadingError, Thread};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True when the failure was a UNIQUE constraint, e.g. two concurrent
    /// first requests racing to create the same device's thread.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Database(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl From<StoreError> for ReadingError {
    fn from(err: StoreError) -> Self {
        ReadingError::StoreUnavailable(err.to_string())
    }
}

/// SQLite-backed store, single connection behind a mutex.
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SessionStore {
    /// Open or create the database at `path` and initialize the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        info!("Opening session database at: {}", db_path.display());

        let open_path = db_path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, rusqlite::Error> {
            let conn = Connection::open(&open_path)?;

            // WAL for concurrent readers while a writer is active
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;

            Ok(conn)
        })
        .await??;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: db_path,
        };

        store.initialize_schema().await?;

        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), StoreError> {
        self.execute(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS threads (
                    id TEXT PRIMARY KEY,
                    device_id TEXT NOT NULL UNIQUE,
                    created_at DATETIME NOT NULL,
                    last_active DATETIME NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_threads_last_active
                 ON threads(last_active)",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS readings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    thread_id TEXT NOT NULL,
                    question TEXT NOT NULL DEFAULT '',
                    card_drawn TEXT NOT NULL,
                    reflection TEXT,
                    interpretation TEXT,
                    created_at DATETIME NOT NULL,
                    FOREIGN KEY(thread_id) REFERENCES threads(id)
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_readings_thread
                 ON readings(thread_id, created_at DESC)",
                [],
            )?;
            // Open readings are what interpret matches against
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_readings_open
                 ON readings(thread_id, card_drawn) WHERE interpretation IS NULL",
                [],
            )?;

            debug!("Session store schema ready");
            Ok(())
        })
        .await
    }

    /// Run a query on the connection in a blocking context.
    pub async fn execute<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, rusqlite::Error> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await?;
        Ok(result?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a thread for a device seen for the first time.
    pub async fn create_thread(&self, device_id: &str) -> Result<Thread, StoreError> {
        let thread = Thread {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.to_string(),
            created_at: Utc::now(),
            last_active: Utc::now(),
        };

        let row = thread.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO threads (id, device_id, created_at, last_active)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.id, row.device_id, row.created_at, row.last_active],
            )?;
            Ok(())
        })
        .await?;

        Ok(thread)
    }

    /// Bump a thread's last_active to now; returns the timestamp written.
    pub async fn touch_thread(&self, id: &str) -> Result<DateTime<Utc>, StoreError> {
        let now = Utc::now();
        let id = id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE threads SET last_active = ?2 WHERE id = ?1",
                params![id, now],
            )?;
            Ok(())
        })
        .await?;
        Ok(now)
    }

    pub async fn find_thread_by_device(
        &self,
        device_id: &str,
    ) -> Result<Option<Thread>, StoreError> {
        let device_id = device_id.to_string();
        self.execute(move |conn| {
            let result = conn.query_row(
                "SELECT id, device_id, created_at, last_active
                 FROM threads WHERE device_id = ?1",
                params![device_id],
                thread_from_row,
            );
            match result {
                Ok(thread) => Ok(Some(thread)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Persist a freshly drawn reading; reflection and interpretation start
    /// out null (the reading is open).
    pub async fn create_reading(&self, new: NewReading) -> Result<Reading, StoreError> {
        let created_at = Utc::now();
        let row = new.clone();
        let id = self
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO readings (thread_id, question, card_drawn, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![row.thread_id, row.question, row.card_drawn, created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        Ok(Reading {
            id,
            thread_id: new.thread_id,
            question: new.question,
            card_drawn: new.card_drawn,
            reflection: None,
            interpretation: None,
            created_at,
        })
    }

    /// Close the most recently opened reading matching thread + card, setting
    /// reflection and interpretation together. Returns the number of rows
    /// affected: 1 when a reading was closed, 0 when none matched (already
    /// closed by a concurrent or earlier call, or never drawn).
    ///
    /// A single conditional UPDATE, never read-then-write.
    pub async fn close_open_reading(
        &self,
        thread_id: &str,
        card_drawn: &str,
        reflection: &str,
        interpretation: &str,
    ) -> Result<usize, StoreError> {
        let thread_id = thread_id.to_string();
        let card_drawn = card_drawn.to_string();
        let reflection = reflection.to_string();
        let interpretation = interpretation.to_string();

        self.execute(move |conn| {
            conn.execute(
                "UPDATE readings SET reflection = ?3, interpretation = ?4
                 WHERE id = (
                     SELECT id FROM readings
                     WHERE thread_id = ?1 AND card_drawn = ?2 AND interpretation IS NULL
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1
                 )",
                params![thread_id, card_drawn, reflection, interpretation],
            )
        })
        .await
    }

    /// All readings for a thread, newest first.
    pub async fn list_readings(&self, thread_id: &str) -> Result<Vec<Reading>, StoreError> {
        let thread_id = thread_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, thread_id, question, card_drawn, reflection, interpretation, created_at
                 FROM readings WHERE thread_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![thread_id], reading_from_row)?;
            rows.collect()
        })
        .await
    }

    /// Reading count and most recent reading date for a thread. A thread
    /// with no readings yields `(0, None)`.
    pub async fn count_and_last_date(
        &self,
        thread_id: &str,
    ) -> Result<(i64, Option<DateTime<Utc>>), StoreError> {
        let thread_id = thread_id.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT COUNT(*), MAX(created_at) FROM readings WHERE thread_id = ?1",
                params![thread_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
        })
        .await
    }

    /// Delete threads inactive for more than `days`, together with their
    /// readings. Returns the number of threads removed.
    pub async fn sweep_inactive_threads(&self, days: i64) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(days);
        let removed = self
            .execute(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM readings WHERE thread_id IN (
                         SELECT id FROM threads WHERE last_active < ?1
                     )",
                    params![cutoff],
                )?;
                let threads = tx.execute(
                    "DELETE FROM threads WHERE last_active < ?1",
                    params![cutoff],
                )?;
                tx.commit()?;
                Ok(threads)
            })
            .await?;

        if removed > 0 {
            info!("Swept {} inactive threads", removed);
        }
        Ok(removed)
    }
}

fn thread_from_row(row: &Row) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        device_id: row.get(1)?,
        created_at: row.get(2)?,
        last_active: row.get(3)?,
    })
}

fn reading_from_row(row: &Row) -> rusqlite::Result<Reading> {
    Ok(Reading {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        question: row.get(2)?,
        card_drawn: row.get(3)?,
        reflection: row.get(4)?,
        interpretation: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("test.db")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn open_creates_schema() {
        let (_dir, store) = open_store().await;
        let tables: i64 = store
            .execute(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
                     AND name IN ('threads', 'readings')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[tokio::test]
    async fn create_and_find_thread() {
        let (_dir, store) = open_store().await;

        assert!(store.find_thread_by_device("abc").await.unwrap().is_none());

        let created = store.create_thread("abc").await.unwrap();
        let found = store
            .find_thread_by_device("abc")
            .await
            .unwrap()
            .expect("thread should exist");
        assert_eq!(found.id, created.id);
        assert_eq!(found.device_id, "abc");
    }

    #[tokio::test]
    async fn duplicate_device_hits_unique_constraint() {
        let (_dir, store) = open_store().await;
        store.create_thread("abc").await.unwrap();

        let err = store.create_thread("abc").await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn touch_moves_last_active_forward() {
        let (_dir, store) = open_store().await;
        let thread = store.create_thread("abc").await.unwrap();

        let touched = store.touch_thread(&thread.id).await.unwrap();
        assert!(touched >= thread.last_active);

        let found = store.find_thread_by_device("abc").await.unwrap().unwrap();
        assert!(found.last_active >= thread.last_active);
    }

    #[tokio::test]
    async fn created_reading_is_open() {
        let (_dir, store) = open_store().await;
        let thread = store.create_thread("abc").await.unwrap();

        let reading = store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: "will I succeed?".to_string(),
                card_drawn: "The Fool".to_string(),
            })
            .await
            .unwrap();

        assert!(reading.id > 0);
        assert!(reading.is_open());

        let listed = store.list_readings(&thread.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_open());
        assert_eq!(listed[0].card_drawn, "The Fool");
    }

    #[tokio::test]
    async fn close_affects_one_row_then_zero() {
        let (_dir, store) = open_store().await;
        let thread = store.create_thread("abc").await.unwrap();
        store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: String::new(),
                card_drawn: "The Fool".to_string(),
            })
            .await
            .unwrap();

        let first = store
            .close_open_reading(&thread.id, "The Fool", "I feel hopeful", "a new journey")
            .await
            .unwrap();
        assert_eq!(first, 1);

        let second = store
            .close_open_reading(&thread.id, "The Fool", "again", "should not land")
            .await
            .unwrap();
        assert_eq!(second, 0);

        let listed = store.list_readings(&thread.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].reflection.as_deref(), Some("I feel hopeful"));
        assert_eq!(listed[0].interpretation.as_deref(), Some("a new journey"));
    }

    #[tokio::test]
    async fn close_targets_newest_open_reading_only() {
        let (_dir, store) = open_store().await;
        let thread = store.create_thread("abc").await.unwrap();

        let older = store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: String::new(),
                card_drawn: "Death".to_string(),
            })
            .await
            .unwrap();
        let newer = store
            .create_reading(NewReading {
                thread_id: thread.id.clone(),
                question: String::new(),
                card_drawn: "Death".to_string(),
            })
            .await
            .unwrap();

        let affected = store
            .close_open_reading(&thread.id, "Death", "r", "endings")
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let listed = store.list_readings(&thread.id).await.unwrap();
        let closed: Vec<i64> = listed
            .iter()
            .filter(|r| !r.is_open())
            .map(|r| r.id)
            .collect();
        assert_eq!(closed, vec![newer.id]);
        assert!(listed.iter().any(|r| r.id == older.id && r.is_open()));
    }

    #[tokio::test]
    async fn concurrent_closes_race_to_one_winner() {
        let (_dir, store) = open_store().await;
        let store = Arc::new(store);
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
            let store = Arc::clone(&store);
            let thread_id = thread.id.clone();
            tokio::spawn(async move {
                store
                    .close_open_reading(&thread_id, "The Fool", "first", "first text")
                    .await
                    .unwrap()
            })
        };
        let b = {
            let store = Arc::clone(&store);
            let thread_id = thread.id.clone();
            tokio::spawn(async move {
                store
                    .close_open_reading(&thread_id, "The Fool", "second", "second text")
                    .await
                    .unwrap()
            })
        };

        let mut affected = vec![a.await.unwrap(), b.await.unwrap()];
        affected.sort();
        assert_eq!(affected, vec![0, 1]);
    }

    #[tokio::test]
    async fn readings_list_newest_first() {
        let (_dir, store) = open_store().await;
        let thread = store.create_thread("abc").await.unwrap();
        for card in ["The Fool", "Death", "The Sun"] {
            store
                .create_reading(NewReading {
                    thread_id: thread.id.clone(),
                    question: String::new(),
                    card_drawn: card.to_string(),
                })
                .await
                .unwrap();
        }

        let listed = store.list_readings(&thread.id).await.unwrap();
        let cards: Vec<&str> = listed.iter().map(|r| r.card_drawn.as_str()).collect();
        assert_eq!(cards, vec!["The Sun", "Death", "The Fool"]);
    }

    #[tokio::test]
    async fn stats_for_fresh_thread_are_zero_and_none() {
        let (_dir, store) = open_store().await;
        let thread = store.create_thread("abc").await.unwrap();

        let (count, last) = store.count_and_last_date(&thread.id).await.unwrap();
        assert_eq!(count, 0);
        assert!(last.is_none());
    }

    #[tokio::test]
    async fn stats_count_readings() {
        let (_dir, store) = open_store().await;
        let thread = store.create_thread("abc").await.unwrap();
        for _ in 0..3 {
            store
                .create_reading(NewReading {
                    thread_id: thread.id.clone(),
                    question: String::new(),
                    card_drawn: "The Star".to_string(),
                })
                .await
                .unwrap();
        }

        let (count, last) = store.count_and_last_date(&thread.id).await.unwrap();
        assert_eq!(count, 3);
        assert!(last.is_some());
    }

    #[tokio::test]
    async fn sweep_removes_inactive_threads_with_their_readings() {
        let (_dir, store) = open_store().await;
        let stale = store.create_thread("stale-device").await.unwrap();
        let fresh = store.create_thread("fresh-device").await.unwrap();
        store
            .create_reading(NewReading {
                thread_id: stale.id.clone(),
                question: String::new(),
                card_drawn: "The Moon".to_string(),
            })
            .await
            .unwrap();

        // Backdate the stale thread past the retention horizon
        let stale_id = stale.id.clone();
        let old = Utc::now() - Duration::days(90);
        store
            .execute(move |conn| {
                conn.execute(
                    "UPDATE threads SET last_active = ?2 WHERE id = ?1",
                    params![stale_id, old],
                )
            })
            .await
            .unwrap();

        let removed = store.sweep_inactive_threads(30).await.unwrap();
        assert_eq!(removed, 1);

        assert!(store
            .find_thread_by_device("stale-device")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_thread_by_device("fresh-device")
            .await
            .unwrap()
            .is_some());
        assert!(store.list_readings(&stale.id).await.unwrap().is_empty());
        assert!(store.list_readings(&fresh.id).await.unwrap().is_empty());
    }
}
