use crate::error::Result;
use crate::record::{DeleteRequest, FullUrl, StoreStats};
use crate::slug::Slug;
use async_trait::async_trait;

/// The contract both back-ends satisfy.
///
/// Callers bound every operation with a deadline (`tokio::time::timeout` at
/// the mediator); implementations must stay consistent when their future is
/// dropped at the deadline. Back-ends that cannot tolerate partial writes
/// run mutations in a spawned task so the work completes regardless.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Inserts a new record.
    ///
    /// Fails with [`StoreError::AlreadyExists`] when the url is stored
    /// already (carrying the previously issued slug), or with
    /// [`StoreError::SlugExists`] on back-ends that key on the slug.
    ///
    /// [`StoreError::AlreadyExists`]: crate::StoreError::AlreadyExists
    /// [`StoreError::SlugExists`]: crate::StoreError::SlugExists
    async fn dump(&self, url: &str, slug: &Slug, user_id: &str) -> Result<()>;

    /// Returns the url stored under `slug`.
    ///
    /// A missing slug is [`StoreError::NotFound`]; a tombstoned record is
    /// [`StoreError::Deleted`].
    ///
    /// [`StoreError::NotFound`]: crate::StoreError::NotFound
    /// [`StoreError::Deleted`]: crate::StoreError::Deleted
    async fn retrieve(&self, slug: &Slug) -> Result<String>;

    /// Returns every non-deleted record belonging to `user_id`, in
    /// unspecified order. Zero records is success with an empty list.
    async fn retrieve_by_user(&self, user_id: &str) -> Result<Vec<FullUrl>>;

    /// Flips `is_deleted` for every record whose slug is in `slugs` *and*
    /// whose owner is `user_id`, atomically per batch. An empty `slugs` is
    /// a success no-op.
    async fn delete_batch(&self, slugs: &[Slug], user_id: &str) -> Result<()>;

    /// Hands one deletion request to the pipeline. Never touches storage
    /// I/O directly, but may await queue capacity.
    async fn enqueue_delete(&self, request: DeleteRequest);

    /// Returns distinct-url / distinct-user counters.
    async fn stats(&self) -> Result<StoreStats>;

    /// Back-end liveness check.
    async fn ping(&self) -> Result<()>;

    /// Releases resources: drains the deletion pipeline, syncs and closes
    /// handles. Called once at shutdown after the process-wide cancellation
    /// token has fired.
    async fn close(&self) -> Result<()>;
}
