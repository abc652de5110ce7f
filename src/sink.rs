//! Record sink
//!
//! Accepts validated records, assigns a strictly increasing unique id and a
//! creation timestamp, and makes them durable before returning. Each insert
//! is one atomic statement; on failure nothing partial persists and the
//! caller owns any retry. Two backends: in-memory for tests/development and
//! SQLite via sqlx.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;

use crate::error::StorageError;
use crate::models::{CandidateRecord, StoredRecord};

/// Append-only record store with autoincrement ids and a liveness probe.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record. The returned `StoredRecord` carries the assigned
    /// id and creation timestamp.
    async fn insert(&self, record: &CandidateRecord) -> Result<StoredRecord, StorageError>;

    /// Trivial round-trip to confirm the backend is reachable.
    async fn ping(&self) -> Result<(), StorageError>;
}

//
// ================= In-memory =================
//

struct MemInner {
    next_id: i64,
    records: Vec<StoredRecord>,
}

/// In-memory store for development and tests. Id assignment and the append
/// happen under one write lock, so concurrent inserts never share an id.
pub struct InMemoryRecordStore {
    inner: RwLock<MemInner>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemInner {
                next_id: 1,
                records: Vec::new(),
            }),
        }
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.records.len()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: &CandidateRecord) -> Result<StoredRecord, StorageError> {
        let mut inner = self.inner.write().await;

        let stored = StoredRecord {
            id: inner.next_id,
            created_at: Utc::now(),
            record: record.clone(),
        };
        inner.next_id += 1;
        inner.records.push(stored.clone());

        Ok(stored)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

//
// ================= SQLite =================

/// SQLite-backed store. The schema is created lazily on first use.
pub struct SqliteRecordStore {
    pool: SqlitePool,
    schema_ready: OnceCell<()>,
}

impl SqliteRecordStore {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // SQLite is single-writer; one pooled connection also keeps
        // `sqlite::memory:` databases coherent across calls.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!(url = %database_url, "connected to record database");

        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS accounting_records (
                      id INTEGER PRIMARY KEY AUTOINCREMENT,
                      account TEXT NOT NULL,
                      currency TEXT NOT NULL,
                      record_type TEXT NOT NULL,
                      main_category TEXT NOT NULL,
                      sub_category TEXT NOT NULL,
                      amount REAL NOT NULL,
                      name TEXT NOT NULL,
                      merchant TEXT NOT NULL DEFAULT '',
                      date TEXT NOT NULL,
                      time TEXT NOT NULL,
                      project TEXT NOT NULL DEFAULT '',
                      description TEXT NOT NULL DEFAULT '',
                      created_at TEXT NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: &CandidateRecord) -> Result<StoredRecord, StorageError> {
        self.ensure_schema().await?;

        let created_at = Utc::now();

        // Single statement: atomic, nothing partial persists on failure.
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO accounting_records
              (account, currency, record_type, main_category, sub_category,
               amount, name, merchant, date, time, project, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&record.account)
        .bind(&record.currency)
        .bind(record.record_type.as_str())
        .bind(&record.main_category)
        .bind(&record.sub_category)
        .bind(record.amount)
        .bind(&record.name)
        .bind(&record.merchant)
        .bind(&record.date)
        .bind(&record.time)
        .bind(&record.project)
        .bind(&record.description)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        info!(id, "record stored");

        Ok(StoredRecord {
            id,
            created_at,
            record: record.clone(),
        })
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
