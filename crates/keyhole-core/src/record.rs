use crate::slug::Slug;
use serde::{Deserialize, Serialize};

/// A stored URL record.
///
/// Records are created by shorten requests and only ever mutated by the
/// deletion pipeline flipping `is_deleted`; they are never physically
/// erased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The opaque identifier of the user that issued the record.
    pub user_id: String,
    /// The original URL supplied by the client.
    pub url: String,
    /// The short identifier the URL was stored under.
    pub slug: Slug,
    /// Tombstone flag; once set it never reverts.
    pub is_deleted: bool,
}

/// Projection of a record returned by per-user queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullUrl {
    pub url: String,
    pub slug: Slug,
}

/// A single unit of work pushed onto the deletion pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub user_id: String,
    pub slug: Slug,
}

/// Storage usage counters returned by `Store::stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Number of distinct stored URLs.
    pub urls: i64,
    /// Number of distinct users that stored at least one URL.
    pub users: i64,
}
