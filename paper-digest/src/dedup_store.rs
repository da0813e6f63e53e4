use crate::traits::DedupStore;
use crate::types::{DigestError, ProcessedRecord, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Processed-article table in SQLite.
///
/// Rows follow the record shape `{article_url, processed_at (ISO-8601), ttl (epoch seconds)}`.
pub struct SqlDedupStore {
    db: SqlitePool,
    table: String,
}

impl SqlDedupStore {
    pub async fn connect(database_url: &str, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let db = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        Self::with_pool(db, table).await
    }

    /// Single-connection in-memory database; the pool must never drop its only connection.
    pub async fn in_memory(table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(db, table).await
    }

    async fn with_pool(db: SqlitePool, table: &str) -> Result<Self> {
        let store = Self {
            db,
            table: table.to_string(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                article_url TEXT PRIMARY KEY,
                processed_at TEXT NOT NULL,
                ttl INTEGER NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.db)
        .await?;

        info!("Dedup table ready: {}", self.table);
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", self.table))
            .fetch_one(&self.db)
            .await?;
        Ok(row.try_get("n")?)
    }
}

#[async_trait]
impl DedupStore for SqlDedupStore {
    fn store_name(&self) -> String {
        self.table.clone()
    }

    async fn lookup(&self, identifier: &str, now: DateTime<Utc>) -> Result<Option<ProcessedRecord>> {
        let row = sqlx::query(&format!(
            "SELECT article_url, processed_at, ttl FROM {} WHERE article_url = ? AND ttl > ?",
            self.table
        ))
        .bind(identifier)
        .bind(now.timestamp())
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let processed_at: String = row.try_get("processed_at")?;
        let ttl: i64 = row.try_get("ttl")?;
        let processed_at = DateTime::parse_from_rfc3339(&processed_at)
            .map_err(|e| DigestError::General(format!("Bad processed_at for {}: {}", identifier, e)))?
            .with_timezone(&Utc);
        let expires_at = DateTime::from_timestamp(ttl, 0)
            .ok_or_else(|| DigestError::General(format!("Bad ttl for {}: {}", identifier, ttl)))?;

        Ok(Some(ProcessedRecord {
            article_identifier: row.try_get("article_url")?,
            processed_at,
            expires_at,
        }))
    }

    async fn put(&self, record: &ProcessedRecord) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (article_url, processed_at, ttl)
            VALUES (?, ?, ?)
            ON CONFLICT (article_url) DO UPDATE SET
                processed_at = excluded.processed_at,
                ttl = excluded.ttl
            "#,
            self.table
        ))
        .bind(&record.article_identifier)
        .bind(record.processed_at.to_rfc3339())
        .bind(record.ttl_epoch_seconds())
        .execute(&self.db)
        .await?;

        debug!("Marked processed: {}", record.article_identifier);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE ttl <= ?", self.table))
            .bind(now.timestamp())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

/// The table name is interpolated into SQL, so only plain identifiers are accepted.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DigestError::Config(format!("Invalid dedup table name: {:?}", table)))
    }
}

/// Pipeline-facing view of the dedup store.
///
/// Lookups fail open and writes are best-effort: neither ever aborts a run.
#[derive(Clone)]
pub struct DedupAdapter {
    store: Arc<dyn DedupStore>,
}

impl DedupAdapter {
    pub fn new(store: Arc<dyn DedupStore>) -> Self {
        Self { store }
    }

    pub fn store_name(&self) -> String {
        self.store.store_name()
    }

    /// Whether `identifier` has an unexpired record. Backend errors read as "not processed".
    pub async fn is_processed(&self, identifier: &str) -> bool {
        match self.store.lookup(identifier, Utc::now()).await {
            Ok(record) => record.is_some(),
            Err(e) => {
                error!("Dedup lookup failed for {}, treating as unprocessed: {}", identifier, e);
                false
            }
        }
    }

    /// Write a record expiring seven days from now. Failures are logged and returned.
    pub async fn mark_processed(&self, identifier: &str) -> Result<()> {
        let record = ProcessedRecord::new(identifier, Utc::now());
        self.store.put(&record).await.map_err(|e| {
            error!("Failed to mark {} as processed: {}", identifier, e);
            e
        })
    }

    /// Mark every identifier, continuing past individual failures. Returns (marked, failed).
    pub async fn mark_all(&self, identifiers: &[String]) -> (usize, usize) {
        let mut marked = 0;
        let mut failed = 0;
        for identifier in identifiers {
            match self.mark_processed(identifier).await {
                Ok(()) => marked += 1,
                Err(_) => failed += 1,
            }
        }
        (marked, failed)
    }

    pub async fn purge_expired(&self) {
        match self.store.purge_expired(Utc::now()).await {
            Ok(0) => {}
            Ok(removed) => info!("Purged {} expired records from {}", removed, self.store_name()),
            Err(e) => warn!("Failed to purge expired records from {}: {}", self.store_name(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn put_then_lookup_round_trips_record_shape() {
        let store = SqlDedupStore::in_memory("processed_articles").await.unwrap();
        let now = Utc::now();
        let record = ProcessedRecord::new("http://arxiv.org/abs/1", now);

        store.put(&record).await.unwrap();
        let found = store.lookup("http://arxiv.org/abs/1", now).await.unwrap().unwrap();

        assert_eq!(found.article_identifier, record.article_identifier);
        assert_eq!(found.processed_at.timestamp(), now.timestamp());
        assert_eq!(found.expires_at.timestamp(), record.ttl_epoch_seconds());
        assert!(store.lookup("http://arxiv.org/abs/2", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_records_read_as_absent_and_get_purged() {
        let store = SqlDedupStore::in_memory("processed_articles").await.unwrap();
        let long_ago = Utc::now() - Duration::days(8);
        store.put(&ProcessedRecord::new("old", long_ago)).await.unwrap();
        store.put(&ProcessedRecord::new("fresh", Utc::now())).await.unwrap();

        assert!(store.lookup("old", Utc::now()).await.unwrap().is_none());
        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remarking_overwrites_expiry() {
        let store = SqlDedupStore::in_memory("processed_articles").await.unwrap();
        store.put(&ProcessedRecord::new("a", Utc::now() - Duration::days(8))).await.unwrap();
        store.put(&ProcessedRecord::new("a", Utc::now())).await.unwrap();

        assert!(store.lookup("a", Utc::now()).await.unwrap().is_some());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn table_names_must_be_plain_identifiers() {
        assert!(validate_table_name("processed_articles").is_ok());
        assert!(validate_table_name("_t2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2fast").is_err());
        assert!(validate_table_name("t; DROP TABLE x").is_err());
    }
}
