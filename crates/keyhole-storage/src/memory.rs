use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use keyhole_core::{DeleteRequest, FullUrl, Result, Slug, Store, StoreError, StoreStats};
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct Record {
    url: String,
    user_id: String,
    is_deleted: bool,
}

/// In-memory back-end used by tests and local development.
///
/// Mirrors the relational back-end's semantics: url uniqueness with the
/// existing slug carried in the conflict error, soft deletion, per-user
/// queries. Deletion requests handed to [`Store::enqueue_delete`] are
/// applied synchronously — there is no pipeline to defer them to.
///
/// DashMap's sharded locks keep concurrent dumps of the same url honest:
/// the url index entry is claimed atomically, so exactly one writer wins.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: DashMap<Slug, Record>,
    url_index: DashMap<String, Slug>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn dump(&self, url: &str, slug: &Slug, user_id: &str) -> Result<()> {
        match self.url_index.entry(url.to_string()) {
            Entry::Occupied(existing) => Err(StoreError::AlreadyExists {
                url: url.to_string(),
                existing: existing.get().clone(),
            }),
            Entry::Vacant(vacant) => {
                if self.entries.contains_key(slug) {
                    return Err(StoreError::SlugExists(slug.clone()));
                }
                vacant.insert(slug.clone());
                self.entries.insert(
                    slug.clone(),
                    Record {
                        url: url.to_string(),
                        user_id: user_id.to_string(),
                        is_deleted: false,
                    },
                );
                Ok(())
            }
        }
    }

    async fn retrieve(&self, slug: &Slug) -> Result<String> {
        match self.entries.get(slug) {
            Some(entry) if entry.is_deleted => Err(StoreError::Deleted(slug.clone())),
            Some(entry) => Ok(entry.url.clone()),
            None => Err(StoreError::NotFound(slug.clone())),
        }
    }

    async fn retrieve_by_user(&self, user_id: &str) -> Result<Vec<FullUrl>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.user_id == user_id && !entry.is_deleted)
            .map(|entry| FullUrl {
                url: entry.url.clone(),
                slug: entry.key().clone(),
            })
            .collect())
    }

    async fn delete_batch(&self, slugs: &[Slug], user_id: &str) -> Result<()> {
        for slug in slugs {
            if let Some(mut entry) = self.entries.get_mut(slug) {
                if entry.user_id == user_id {
                    entry.is_deleted = true;
                }
            }
        }
        Ok(())
    }

    async fn enqueue_delete(&self, request: DeleteRequest) {
        // Applied synchronously; see the type-level docs.
        let _ = self
            .delete_batch(std::slice::from_ref(&request.slug), &request.user_id)
            .await;
    }

    async fn stats(&self) -> Result<StoreStats> {
        let users: HashSet<String> = self
            .entries
            .iter()
            .map(|entry| entry.user_id.clone())
            .collect();
        Ok(StoreStats {
            urls: self.entries.len() as i64,
            users: users.len() as i64,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn dump_and_retrieve() {
        let store = MemoryStore::new();
        store
            .dump("https://example.com", &Slug::new("abc12"), "user-1")
            .await
            .unwrap();

        let url = store.retrieve(&Slug::new("abc12")).await.unwrap();
        assert_eq!(url, "https://example.com");
    }

    #[tokio::test]
    async fn duplicate_url_carries_existing_slug() {
        let store = MemoryStore::new();
        store
            .dump("https://example.com", &Slug::new("first"), "user-1")
            .await
            .unwrap();

        let err = store
            .dump("https://example.com", &Slug::new("second"), "user-2")
            .await
            .unwrap_err();
        match err {
            StoreError::AlreadyExists { existing, .. } => assert_eq!(existing.as_str(), "first"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn soft_delete_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let slug = Slug::new("abc12");
        store.dump("https://example.com", &slug, "user-1").await.unwrap();

        // A delete by someone else leaves the record alone.
        store.delete_batch(&[slug.clone()], "user-2").await.unwrap();
        assert!(store.retrieve(&slug).await.is_ok());

        store.delete_batch(&[slug.clone()], "user-1").await.unwrap();
        let err = store.retrieve(&slug).await.unwrap_err();
        assert!(matches!(err, StoreError::Deleted(_)));
    }

    #[tokio::test]
    async fn empty_delete_batch_is_a_noop() {
        let store = MemoryStore::new();
        store.delete_batch(&[], "user-1").await.unwrap();
    }

    #[tokio::test]
    async fn deleted_records_leave_user_listing() {
        let store = MemoryStore::new();
        store.dump("https://a.example", &Slug::new("aaa11"), "user-1").await.unwrap();
        store.dump("https://b.example", &Slug::new("bbb22"), "user-1").await.unwrap();

        store.delete_batch(&[Slug::new("aaa11")], "user-1").await.unwrap();

        let urls = store.retrieve_by_user("user-1").await.unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].url, "https://b.example");
    }

    #[tokio::test]
    async fn concurrent_dumps_of_same_url_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();

        for i in 0..100 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .dump("https://example.com", &Slug::new(format!("slug{i}")), "user-1")
                    .await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => wins += 1,
                Err(StoreError::AlreadyExists { .. }) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 99);
    }

    #[tokio::test]
    async fn stats_count_distinct_urls_and_users() {
        let store = MemoryStore::new();
        store.dump("https://a.example", &Slug::new("aaa11"), "user-1").await.unwrap();
        store.dump("https://b.example", &Slug::new("bbb22"), "user-1").await.unwrap();
        store.dump("https://c.example", &Slug::new("ccc33"), "user-2").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.urls, 3);
        assert_eq!(stats.users, 2);
    }
}
