//! SQLite storage backend implementation.
//!
//! Uses `rusqlite` for synchronous operations and `tokio-rusqlite` to run
//! them on a dedicated thread. The hierarchy is stored in three tables, one
//! per level, and reassembled on read.

mod conversions;
mod error;
mod repository;
mod schema;

pub use repository::SqliteRepository;
