use std::sync::Arc;

use keyhole_core::{DeleteRequest, FullUrl, Slug, Store, StoreError, StoreStats};
use thiserror::Error;
use tracing::{debug, warn};

use crate::generator::SlugGenerator;

/// Attempts at a fresh slug before a taken-slug error surfaces as internal.
const MAX_SLUG_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The shortener service: URL validation, slug generation and storage
/// orchestration.
pub struct ShortenerService {
    store: Arc<dyn Store>,
    generator: Box<dyn SlugGenerator>,
}

impl ShortenerService {
    pub fn new(store: Arc<dyn Store>, generator: Box<dyn SlugGenerator>) -> Self {
        Self { store, generator }
    }

    /// Validates `url`, produces a slug and stores the pair.
    ///
    /// A slug already taken in the back-end is retried with a fresh one;
    /// a url already stored propagates as
    /// [`StoreError::AlreadyExists`] carrying the previously issued slug.
    pub async fn encode(&self, url: &str, user_id: &str) -> Result<Slug, ServiceError> {
        validate_url(url)?;

        let mut last_taken = None;
        for _ in 0..MAX_SLUG_ATTEMPTS {
            let slug = self.generator.generate();
            match self.store.dump(url, &slug, user_id).await {
                Ok(()) => {
                    debug!(slug = %slug, "url shortened");
                    return Ok(slug);
                }
                Err(StoreError::SlugExists(taken)) => {
                    warn!(slug = %taken, "generated slug already taken, retrying");
                    last_taken = Some(taken);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ServiceError::Store(StoreError::SlugExists(
            last_taken.unwrap_or_else(|| Slug::new("")),
        )))
    }

    /// Returns the original url stored under `slug`.
    pub async fn decode(&self, slug: &Slug) -> Result<String, ServiceError> {
        Ok(self.store.retrieve(slug).await?)
    }

    /// Returns every live pair belonging to `user_id`.
    pub async fn decode_by_user(&self, user_id: &str) -> Result<Vec<FullUrl>, ServiceError> {
        Ok(self.store.retrieve_by_user(user_id).await?)
    }

    /// Pushes one deletion request per slug onto the pipeline and returns
    /// once all are enqueued; the tombstones land asynchronously.
    pub async fn delete(&self, slugs: Vec<Slug>, user_id: &str) {
        for slug in slugs {
            self.store
                .enqueue_delete(DeleteRequest {
                    user_id: user_id.to_string(),
                    slug,
                })
                .await;
        }
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.store.ping().await?)
    }

    pub async fn stats(&self) -> Result<StoreStats, ServiceError> {
        Ok(self.store.stats().await?)
    }
}

/// Rejects anything but an absolute URL with a scheme and host.
fn validate_url(url: &str) -> Result<(), ServiceError> {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.has_host() => Ok(()),
        Ok(_) => Err(ServiceError::InvalidUrl(format!("{url}: missing host"))),
        Err(e) => Err(ServiceError::InvalidUrl(format!("{url}: {e}"))),
    }
}
