use std::sync::Arc;

use async_trait::async_trait;
use keyhole_core::{DeleteRequest, FullUrl, Result, Slug, Store, StoreError, StoreStats, UrlRecord};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::deleter;

/// Postgres implementation of the storage contract.
///
/// A single `urls` table with url uniqueness and an `is_deleted` tombstone.
/// Batch deletes run in a transaction driven by the deletion pipeline; a
/// caller deadline that drops an in-flight operation leaves the transaction
/// to roll back through sqlx.
pub struct PgStore {
    pool: PgPool,
    queue: mpsc::Sender<DeleteRequest>,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PgStore {
    /// Connects to `dsn`, creates the schema when missing, and spawns the
    /// deletion pipeline. The pipeline performs its final flush and the
    /// pool is closed when `shutdown` fires and [`Store::close`] is called.
    pub async fn open(dsn: &str, shutdown: CancellationToken) -> Result<Arc<Self>> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(dsn)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                id bigserial NOT NULL,
                user_id text NOT NULL,
                url text NOT NULL UNIQUE,
                short_url text NOT NULL,
                is_deleted boolean NOT NULL DEFAULT false
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(map_sqlx_error)?;
        info!("postgres storage ready");

        let (tx, rx) = mpsc::channel(deleter::QUEUE_DEPTH);
        let store = Arc::new(Self {
            pool,
            queue: tx,
            worker: Mutex::new(None),
        });

        // The consumer holds its own handle on the store; the reference is
        // released when the pipeline exits at shutdown.
        let consumer: Arc<dyn Store> = store.clone() as Arc<dyn Store>;
        let handle = deleter::spawn(consumer, rx, shutdown);
        *store.worker.lock().await = Some(handle);

        Ok(store)
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn scan_record(row: &PgRow) -> Result<UrlRecord> {
    let slug: String = row.try_get("short_url").map_err(map_sqlx_error)?;
    Ok(UrlRecord {
        user_id: row.try_get("user_id").map_err(map_sqlx_error)?,
        url: row.try_get("url").map_err(map_sqlx_error)?,
        slug: Slug::new(slug),
        is_deleted: row.try_get("is_deleted").map_err(map_sqlx_error)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StoreError::InvalidData(message),
        _ => StoreError::Query(message),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn dump(&self, url: &str, slug: &Slug, user_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO urls (user_id, url, short_url)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(url)
        .bind(slug.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(slug = %slug, "stored url");
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => {
                // Fetch the slug the conflicting url was stored under so the
                // caller can echo it.
                let row = sqlx::query(r#"SELECT short_url FROM urls WHERE url = $1"#)
                    .bind(url)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;
                let existing: String = row.try_get("short_url").map_err(map_sqlx_error)?;
                Err(StoreError::AlreadyExists {
                    url: url.to_string(),
                    existing: Slug::new(existing),
                })
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn retrieve(&self, slug: &Slug) -> Result<String> {
        let row = sqlx::query(
            r#"
            SELECT user_id, url, short_url, is_deleted
            FROM urls
            WHERE short_url = $1
            LIMIT 1
            "#,
        )
        .bind(slug.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(slug.clone()));
        };

        let record = scan_record(&row)?;
        if record.is_deleted {
            return Err(StoreError::Deleted(slug.clone()));
        }
        Ok(record.url)
    }

    async fn retrieve_by_user(&self, user_id: &str) -> Result<Vec<FullUrl>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, url, short_url, is_deleted
            FROM urls
            WHERE user_id = $1 AND NOT is_deleted
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                let record = scan_record(row)?;
                Ok(FullUrl {
                    url: record.url,
                    slug: record.slug,
                })
            })
            .collect()
    }

    async fn delete_batch(&self, slugs: &[Slug], user_id: &str) -> Result<()> {
        if slugs.is_empty() {
            return Ok(());
        }

        let slugs: Vec<&str> = slugs.iter().map(Slug::as_str).collect();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query(
            r#"
            UPDATE urls
            SET is_deleted = true
            WHERE user_id = $1 AND short_url = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(&slugs)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(user_id, count = slugs.len(), "soft-deleted batch");
        Ok(())
    }

    async fn enqueue_delete(&self, request: DeleteRequest) {
        // Awaiting capacity surfaces queue back-pressure as request latency
        // inside the caller's deadline. A send failure means shutdown is in
        // progress and the request is dropped with the rest of the queue.
        if self.queue.send(request).await.is_err() {
            debug!("deletion queue closed; request dropped");
        }
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(DISTINCT url) AS urls, COUNT(DISTINCT user_id) AS users
            FROM urls
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(StoreStats {
            urls: row.try_get("urls").map_err(map_sqlx_error)?,
            users: row.try_get("users").map_err(map_sqlx_error)?,
        })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Wait for the pipeline's final flush before tearing the pool down.
        let worker = self.worker.lock().await.take();
        if let Some(handle) = worker {
            handle
                .await
                .map_err(|e| StoreError::Unavailable(format!("deletion worker failed: {e}")))?;
        }
        self.pool.close().await;
        info!("postgres storage closed");
        Ok(())
    }
}
