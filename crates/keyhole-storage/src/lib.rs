//! Storage back-ends for the keyhole URL shortener.
//!
//! Two interchangeable production back-ends sit behind the
//! [`keyhole_core::Store`] contract: an append-only file journal
//! ([`FileStore`]) and a Postgres table ([`PgStore`]), plus an in-memory
//! back-end ([`MemoryStore`]) used by tests and local development. The
//! [`deleter`] module hosts the asynchronous soft-delete pipeline that the
//! Postgres back-end drives its batch deletes through.

pub mod deleter;
pub mod file;
pub mod memory;
pub mod postgres;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;
