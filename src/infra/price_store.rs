use crate::app::ports::PriceStorePort;
use crate::common::error::{DiggerError, Result};
use crate::common::types::{
    CollectionSession, Currency, PriceRecord, PriceStatistics, SessionState, SourcePath,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// SQLite-backed store for price records and collection sessions.
pub struct SqlitePriceStore {
    conn: Mutex<Connection>,
}

impl SqlitePriceStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS price_records (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                release_id    INTEGER NOT NULL,
                lowest        REAL,
                median        REAL,
                highest       REAL,
                currency      TEXT NOT NULL,
                num_for_sale  INTEGER NOT NULL,
                source_path   TEXT NOT NULL,
                captured_at   INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_price_records_release
                ON price_records (release_id, captured_at);
            CREATE TABLE IF NOT EXISTS collection_sessions (
                id           TEXT PRIMARY KEY,
                release_id   INTEGER NOT NULL,
                started_at   INTEGER NOT NULL,
                finished_at  INTEGER NOT NULL,
                state        TEXT NOT NULL,
                source_path  TEXT NOT NULL,
                trail        TEXT NOT NULL,
                error        TEXT
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DiggerError::PersistenceFailure("price store lock poisoned".into()))
    }

    pub fn latest_record(&self, release_id: u64) -> Result<Option<PriceRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT lowest, median, highest, currency, num_for_sale, source_path, captured_at
                 FROM price_records WHERE release_id = ?1
                 ORDER BY captured_at DESC, id DESC LIMIT 1",
                params![release_id as i64],
                |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                },
            )
            .optional()?;

        Ok(record.map(
            |(lowest, median, highest, currency, num_for_sale, source_path, captured_at)| {
                PriceRecord {
                    release_id,
                    statistics: PriceStatistics {
                        lowest,
                        median,
                        highest,
                        currency: Currency::from_code(&currency).unwrap_or_default(),
                        num_for_sale: num_for_sale.max(0) as u32,
                    },
                    source_path: SourcePath::parse(&source_path),
                    captured_at: from_millis(captured_at),
                }
            },
        ))
    }

    pub fn sessions_for(&self, release_id: u64) -> Result<Vec<CollectionSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, state, source_path, trail, error
             FROM collection_sessions WHERE release_id = ?1 ORDER BY started_at",
        )?;
        let rows = stmt.query_map(params![release_id as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, started_at, finished_at, state, source_path, trail, error) = row?;
            sessions.push(CollectionSession {
                id: Uuid::parse_str(&id).map_err(|e| {
                    DiggerError::PersistenceFailure(format!("bad session id {}: {}", id, e))
                })?,
                release_id,
                started_at: from_millis(started_at),
                finished_at: from_millis(finished_at),
                state: if state == SessionState::Done.as_str() {
                    SessionState::Done
                } else {
                    SessionState::Failed
                },
                source_path: SourcePath::parse(&source_path),
                trail: serde_json::from_str(&trail)?,
                error,
            });
        }
        Ok(sessions)
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[async_trait]
impl PriceStorePort for SqlitePriceStore {
    async fn latest_capture(&self, release_id: u64) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let latest: Option<i64> = conn.query_row(
            "SELECT MAX(captured_at) FROM price_records WHERE release_id = ?1",
            params![release_id as i64],
            |row| row.get(0),
        )?;
        Ok(latest.map(from_millis))
    }

    async fn save_price_record(&self, record: &PriceRecord) -> Result<()> {
        let conn = self.conn()?;
        let stats = &record.statistics;
        conn.execute(
            "INSERT INTO price_records
                (release_id, lowest, median, highest, currency, num_for_sale, source_path, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.release_id as i64,
                stats.lowest,
                stats.median,
                stats.highest,
                stats.currency.code(),
                stats.num_for_sale as i64,
                record.source_path.as_str(),
                record.captured_at.timestamp_millis(),
            ],
        )?;
        debug!("Stored price record for release {}", record.release_id);
        Ok(())
    }

    async fn save_session(&self, session: &CollectionSession) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO collection_sessions
                (id, release_id, started_at, finished_at, state, source_path, trail, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id.to_string(),
                session.release_id as i64,
                session.started_at.timestamp_millis(),
                session.finished_at.timestamp_millis(),
                session.state.as_str(),
                session.source_path.as_str(),
                serde_json::to_string(&session.trail)?,
                session.error,
            ],
        )?;
        debug!("Stored collection session {} for release {}", session.id, session.release_id);
        Ok(())
    }
}

/// In-memory store for development/testing
#[derive(Default)]
pub struct InMemoryPriceStore {
    records: Mutex<Vec<PriceRecord>>,
    sessions: Mutex<Vec<CollectionSession>>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PriceRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn sessions(&self) -> Vec<CollectionSession> {
        self.sessions.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> DiggerError {
    DiggerError::PersistenceFailure("in-memory store lock poisoned".into())
}

#[async_trait]
impl PriceStorePort for InMemoryPriceStore {
    async fn latest_capture(&self, release_id: u64) -> Result<Option<DateTime<Utc>>> {
        let records = self.records.lock().map_err(poisoned)?;
        Ok(records
            .iter()
            .filter(|r| r.release_id == release_id)
            .map(|r| r.captured_at)
            .max())
    }

    async fn save_price_record(&self, record: &PriceRecord) -> Result<()> {
        self.records.lock().map_err(poisoned)?.push(record.clone());
        Ok(())
    }

    async fn save_session(&self, session: &CollectionSession) -> Result<()> {
        self.sessions.lock().map_err(poisoned)?.push(session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::FreshnessPort;

    fn record(release_id: u64, captured_at: DateTime<Utc>) -> PriceRecord {
        PriceRecord {
            release_id,
            statistics: PriceStatistics {
                lowest: Some(0.96),
                median: None,
                highest: Some(11.76),
                currency: Currency::Eur,
                num_for_sale: 4,
            },
            source_path: SourcePath::Scraped,
            captured_at,
        }
    }

    #[tokio::test]
    async fn sqlite_round_trips_nullable_prices() {
        let store = SqlitePriceStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.save_price_record(&record(7, now)).await.unwrap();

        let latest = store.latest_record(7).unwrap().unwrap();
        assert_eq!(latest.statistics.lowest, Some(0.96));
        assert_eq!(latest.statistics.median, None);
        assert_eq!(latest.statistics.currency, Currency::Eur);
        assert_eq!(latest.source_path, SourcePath::Scraped);
        assert_eq!(latest.captured_at.timestamp_millis(), now.timestamp_millis());
        assert!(store.latest_record(8).unwrap().is_none());
    }

    #[tokio::test]
    async fn freshness_follows_latest_capture() {
        let store = SqlitePriceStore::open_in_memory().unwrap();
        let window = chrono::Duration::hours(24);
        assert!(!store.recently_collected(1, window).await.unwrap());

        store
            .save_price_record(&record(1, Utc::now() - chrono::Duration::hours(30)))
            .await
            .unwrap();
        assert!(!store.recently_collected(1, window).await.unwrap());

        store
            .save_price_record(&record(1, Utc::now() - chrono::Duration::hours(2)))
            .await
            .unwrap();
        assert!(store.recently_collected(1, window).await.unwrap());
    }

    #[tokio::test]
    async fn sessions_keep_trail_and_error() {
        let store = SqlitePriceStore::open_in_memory().unwrap();
        let session = CollectionSession {
            id: Uuid::new_v4(),
            release_id: 3,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            state: SessionState::Failed,
            source_path: SourcePath::None,
            trail: vec!["direct_fetch".into(), "proxy_fetch".into()],
            error: Some("timeout".into()),
        };
        store.save_session(&session).await.unwrap();

        let sessions = store.sessions_for(3).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, session.id);
        assert_eq!(sessions[0].state, SessionState::Failed);
        assert_eq!(sessions[0].trail, session.trail);
        assert_eq!(sessions[0].error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn in_memory_store_tracks_latest_capture() {
        let store = InMemoryPriceStore::new();
        let older = Utc::now() - chrono::Duration::hours(5);
        let newer = Utc::now();
        store.save_price_record(&record(9, older)).await.unwrap();
        store.save_price_record(&record(9, newer)).await.unwrap();
        assert_eq!(store.latest_capture(9).await.unwrap(), Some(newer));
        assert_eq!(store.records().len(), 2);
    }
}
