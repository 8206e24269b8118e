//! Shortening service for the keyhole URL shortener.
//!
//! This crate hosts the slug generator, the shortener service that
//! orchestrates validation and storage, and the deadline-bounded request
//! mediator shared by the HTTP and gRPC fronts.

pub mod generator;
pub mod mediator;
pub mod service;

pub use generator::{NanoSlugGenerator, SlugGenerator, SlugSettings};
pub use mediator::{Mediator, OwnedUrl, RequestError};
pub use service::{ServiceError, ShortenerService};

// Re-export core types so front-ends can depend on one service crate.
pub use keyhole_core::{FullUrl, Slug, Store, StoreStats};
