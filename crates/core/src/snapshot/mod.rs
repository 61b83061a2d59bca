mod error;
mod file;
mod types;

pub use error::{Result, SnapshotError, SnapshotFileError};
pub use file::{FileNode, SnapshotFile, DEFAULT_SOURCE, SCHEMA_VERSION};
pub use types::{Category, Group, Item, Snapshot, SnapshotView};
