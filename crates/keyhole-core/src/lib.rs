//! Core types and traits for the keyhole URL shortener.
//!
//! This crate provides the shared record types, the storage contract that
//! every back-end satisfies, and the storage error taxonomy consumed by the
//! service and wire layers.

pub mod error;
pub mod record;
pub mod slug;
pub mod store;

pub use error::{Result, StoreError};
pub use record::{DeleteRequest, FullUrl, StoreStats, UrlRecord};
pub use slug::Slug;
pub use store::Store;
