//! Deadline-bounded request mediation.
//!
//! Every externally-triggered operation runs against a bounded deadline;
//! expiry pre-empts the storage call and classifies as `Timeout`. Concrete
//! service errors classify structurally into the small user-visible
//! taxonomy shared by both wire fronts, and result URLs are composed by
//! joining the configured base URL with the slug.

use std::future::Future;
use std::time::Duration;

use keyhole_core::{Slug, StoreError, StoreStats};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::service::{ServiceError, ShortenerService};

/// Default per-operation deadline.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(500);

/// The error taxonomy visible to wire fronts.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("token authentication failed")]
    InvalidAuth,
    #[error("{0}: not found")]
    NotFound(String),
    #[error("{0}: was deleted")]
    Deleted(String),
    /// The url was already stored; carries the absolute short URL so fronts
    /// can echo it.
    #[error("already stored as {short_url}")]
    Conflict { short_url: String },
    #[error("request deadline exceeded")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

/// A user-owned pair with the short side already absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedUrl {
    pub original_url: String,
    pub short_url: String,
}

/// Deadline scoping, error classification and URL composition in front of
/// the shortener service.
pub struct Mediator {
    service: ShortenerService,
    base_url: Url,
    op_timeout: Duration,
}

impl Mediator {
    pub fn new(service: ShortenerService, base_url: Url) -> Self {
        Self::with_timeout(service, base_url, DEFAULT_OP_TIMEOUT)
    }

    pub fn with_timeout(service: ShortenerService, base_url: Url, op_timeout: Duration) -> Self {
        Self {
            service,
            base_url,
            op_timeout,
        }
    }

    /// Joins the base URL with a slug, replacing the path component only.
    pub fn short_url(&self, slug: &Slug) -> String {
        let mut url = self.base_url.clone();
        url.set_path(slug.as_str());
        url.to_string()
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, RequestError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(self.classify(err)),
            Err(_) => {
                debug!("operation pre-empted by deadline");
                Err(RequestError::Timeout)
            }
        }
    }

    fn classify(&self, err: ServiceError) -> RequestError {
        match err {
            ServiceError::InvalidUrl(msg) => RequestError::InvalidUrl(msg),
            ServiceError::Store(StoreError::AlreadyExists { existing, .. }) => {
                RequestError::Conflict {
                    short_url: self.short_url(&existing),
                }
            }
            ServiceError::Store(StoreError::NotFound(slug)) => {
                RequestError::NotFound(slug.to_string())
            }
            ServiceError::Store(StoreError::Deleted(slug)) => {
                RequestError::Deleted(slug.to_string())
            }
            ServiceError::Store(StoreError::Timeout(msg)) => {
                debug!(%msg, "back-end reported timeout");
                RequestError::Timeout
            }
            ServiceError::Store(other) => RequestError::Internal(other.to_string()),
        }
    }

    /// Shortens `url` for `user_id` and returns the absolute short URL.
    pub async fn shorten(&self, url: &str, user_id: &str) -> Result<String, RequestError> {
        let slug = self.bounded(self.service.encode(url, user_id)).await?;
        Ok(self.short_url(&slug))
    }

    /// Resolves a slug back to the original URL.
    pub async fn resolve(&self, slug: &Slug) -> Result<String, RequestError> {
        self.bounded(self.service.decode(slug)).await
    }

    /// Lists the caller's live pairs with absolute short URLs.
    pub async fn urls_for_user(&self, user_id: &str) -> Result<Vec<OwnedUrl>, RequestError> {
        let pairs = self.bounded(self.service.decode_by_user(user_id)).await?;
        Ok(pairs
            .into_iter()
            .map(|pair| OwnedUrl {
                short_url: self.short_url(&pair.slug),
                original_url: pair.url,
            })
            .collect())
    }

    /// Accepts slugs for asynchronous deletion.
    pub async fn delete(&self, slugs: Vec<Slug>, user_id: &str) -> Result<(), RequestError> {
        match tokio::time::timeout(self.op_timeout, self.service.delete(slugs, user_id)).await {
            Ok(()) => Ok(()),
            Err(_) => Err(RequestError::Timeout),
        }
    }

    pub async fn ping(&self) -> Result<(), RequestError> {
        self.service.ping().await.map_err(|e| self.classify(e))
    }

    pub async fn stats(&self) -> Result<StoreStats, RequestError> {
        self.bounded(self.service.stats()).await
    }
}
