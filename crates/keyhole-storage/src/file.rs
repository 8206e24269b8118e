use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use keyhole_core::{DeleteRequest, FullUrl, Result, Slug, Store, StoreError, StoreStats};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One journal line. Field names are part of the on-disk format and must
/// not change.
#[derive(Debug, Serialize, Deserialize)]
struct JournalRecord {
    #[serde(rename = "sURL")]
    surl: String,
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "userID")]
    user_id: String,
}

#[derive(Debug, Clone)]
struct MapEntry {
    url: String,
    user_id: String,
}

struct FileInner {
    entries: HashMap<Slug, MapEntry>,
    journal: File,
}

/// Append-only journaled map back-end.
///
/// State is an in-memory map restored from the journal at start-up plus the
/// open journal handle, both behind one exclusive lock. Mutations run in a
/// spawned task so a caller abandoning the operation at its deadline never
/// truncates a write: the work is either a completed append or a handled
/// error.
///
/// Uniqueness is enforced on the slug, not the url; storing the same url
/// twice yields two records under distinct slugs. Soft deletion is not
/// supported: `delete_batch` is a success no-op and `enqueue_delete` drops
/// the request.
#[derive(Clone)]
pub struct FileStore {
    inner: Arc<Mutex<FileInner>>,
    path: PathBuf,
}

impl FileStore {
    /// Opens the journal at `path`, restoring the in-memory map from its
    /// contents. A missing or empty file is an empty map; a malformed line
    /// fails start-up.
    ///
    /// A background watcher syncs the journal when `shutdown` fires.
    pub async fn open(path: impl AsRef<Path>, shutdown: CancellationToken) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = restore(&path).await?;
        info!(path = %path.display(), records = entries.len(), "file storage restored");

        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let store = Self {
            inner: Arc::new(Mutex::new(FileInner { entries, journal })),
            path,
        };

        let inner = Arc::clone(&store.inner);
        tokio::spawn(async move {
            shutdown.cancelled().await;
            let inner = inner.lock().await;
            if let Err(e) = inner.journal.sync_all().await {
                tracing::error!(error = %e, "journal sync on shutdown failed");
            } else {
                info!("file storage closed");
            }
        });

        Ok(store)
    }

    /// Path of the backing journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").field("path", &self.path).finish()
    }
}

async fn restore(path: &Path) -> Result<HashMap<Slug, MapEntry>> {
    let mut entries = HashMap::new();
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(e.into()),
    };

    let mut lines = BufReader::new(file).lines();
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        let record: JournalRecord = serde_json::from_str(&line)?;
        entries.insert(
            Slug::new(record.surl),
            MapEntry {
                url: record.url,
                user_id: record.user_id,
            },
        );
    }
    Ok(entries)
}

#[async_trait]
impl Store for FileStore {
    async fn dump(&self, url: &str, slug: &Slug, user_id: &str) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let url = url.to_string();
        let slug = slug.clone();
        let user_id = user_id.to_string();

        // Spawned so the write completes even when the caller's deadline
        // drops the returned future mid-flight.
        let handle = tokio::spawn(async move {
            let mut inner = inner.lock().await;
            if inner.entries.contains_key(&slug) {
                return Err(StoreError::SlugExists(slug));
            }
            let record = JournalRecord {
                surl: slug.as_str().to_string(),
                url: url.clone(),
                user_id: user_id.clone(),
            };
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            inner.journal.write_all(&line).await?;
            inner.journal.flush().await?;
            inner.entries.insert(slug.clone(), MapEntry { url, user_id });
            debug!(slug = %slug, "stored url in journal");
            Ok(())
        });

        handle
            .await
            .map_err(|e| StoreError::Io(format!("dump task failed: {e}")))?
    }

    async fn retrieve(&self, slug: &Slug) -> Result<String> {
        let inner = self.inner.lock().await;
        match inner.entries.get(slug) {
            Some(entry) => Ok(entry.url.clone()),
            None => Err(StoreError::NotFound(slug.clone())),
        }
    }

    async fn retrieve_by_user(&self, user_id: &str) -> Result<Vec<FullUrl>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id)
            .map(|(slug, entry)| FullUrl {
                url: entry.url.clone(),
                slug: slug.clone(),
            })
            .collect())
    }

    async fn delete_batch(&self, _slugs: &[Slug], _user_id: &str) -> Result<()> {
        // The journal is append-only and carries no tombstones.
        Ok(())
    }

    async fn enqueue_delete(&self, request: DeleteRequest) {
        debug!(slug = %request.slug, "file storage dropped delete request");
    }

    async fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.lock().await;
        let users: HashSet<&str> = inner.entries.values().map(|e| e.user_id.as_str()).collect();
        Ok(StoreStats {
            urls: inner.entries.len() as i64,
            users: users.len() as i64,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let inner = self.inner.lock().await;
        inner.journal.sync_all().await?;
        Ok(())
    }
}
