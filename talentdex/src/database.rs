//! SQLite primary store for candidate records
//!
//! The primary store is the system of record; the search index is derived from
//! it and can always be rebuilt by paging through `candidates` in rowid order.
//! Uses r2d2 connection pooling to allow concurrent reads without mutex blocking.

use crate::models::{CandidateRecord, StoredCandidate};
use chrono::{DateTime, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Corrupt candidate payload for {id}: {source}")]
    Payload {
        id: String,
        source: serde_json::Error,
    },
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse timestamp string from database to DateTime<Utc>
fn parse_db_timestamp(timestamp_str: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(|_| Utc::now())
}

/// Thread-safe database wrapper using connection pooling
///
/// WAL mode lets readers proceed while the write path upserts.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA busy_timeout=5000;
                PRAGMA cache_size=-16000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uniqueId TEXT NOT NULL UNIQUE,
                payload TEXT NOT NULL,
                createdAt TEXT NOT NULL,
                updatedAt TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_candidates_updated ON candidates(updatedAt);
        "#,
        )?;
        Ok(())
    }

    /// Total number of candidates
    pub fn count_candidates(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM candidates", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Create or replace the record with the same unique id.
    /// The rowid of an existing candidate is preserved.
    pub fn upsert_candidate(&self, record: &CandidateRecord) -> DatabaseResult<StoredCandidate> {
        let payload = serde_json::to_string(record).map_err(|source| DatabaseError::Payload {
            id: record.id.clone(),
            source,
        })?;
        let now = Utc::now();
        let now_str = now.format(TIMESTAMP_FORMAT).to_string();

        let conn = self.get_conn()?;
        let row_id: i64 = conn.query_row(
            r#"INSERT INTO candidates (uniqueId, payload, createdAt, updatedAt)
               VALUES (?1, ?2, ?3, ?3)
               ON CONFLICT(uniqueId) DO UPDATE SET payload = excluded.payload, updatedAt = excluded.updatedAt
               RETURNING id"#,
            params![record.id, payload, now_str],
            |row| row.get(0),
        )?;

        Ok(StoredCandidate {
            row_id,
            record: record.clone(),
            updated_at: parse_db_timestamp(&now_str),
        })
    }

    /// Fetch a candidate by its unique id
    pub fn get_candidate(&self, unique_id: &str) -> DatabaseResult<Option<StoredCandidate>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT id, uniqueId, payload, updatedAt FROM candidates WHERE uniqueId = ?1",
                params![unique_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(row_id, id, payload, updated_at)| Self::decode_row(row_id, id, &payload, &updated_at))
            .transpose()
    }

    /// Delete a candidate. Returns whether a row was removed.
    pub fn delete_candidate(&self, unique_id: &str) -> DatabaseResult<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM candidates WHERE uniqueId = ?1", params![unique_id])?;
        Ok(deleted > 0)
    }

    /// Keyset page of candidates with rowid greater than `after_row_id`, in rowid order.
    ///
    /// Stable under concurrent inserts: new rows land after the cursor and are
    /// picked up by a later page instead of shifting earlier ones.
    pub fn fetch_page(&self, after_row_id: i64, limit: usize) -> DatabaseResult<Vec<StoredCandidate>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, uniqueId, payload, updatedAt FROM candidates WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![after_row_id, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(row_id, id, payload, updated_at)| Self::decode_row(row_id, id, &payload, &updated_at))
            .collect()
    }

    fn decode_row(row_id: i64, id: String, payload: &str, updated_at: &str) -> DatabaseResult<StoredCandidate> {
        let mut record: CandidateRecord =
            serde_json::from_str(payload).map_err(|source| DatabaseError::Payload { id: id.clone(), source })?;
        // The column is authoritative for the key
        record.id = id;
        Ok(StoredCandidate {
            row_id,
            record,
            updated_at: parse_db_timestamp(updated_at),
        })
    }
}
