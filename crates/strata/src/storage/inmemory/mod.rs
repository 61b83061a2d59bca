//! In-memory storage backend.
//!
//! Keeps the hierarchy in a `Vec<Group>` behind `Arc<RwLock<_>>`. Used by
//! tests and by the binary when no database is configured; nothing is
//! persisted.

mod repository;

pub use repository::InMemoryRepository;
