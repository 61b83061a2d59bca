//! Object store implementations.
//!
//! - [`MemoryObjectStore`]: process-local, for tests and dry runs
//! - [`LocalObjectStore`]: one directory per bucket under a root, with a
//!   `<name>.metadata.json` sidecar next to each object

pub mod local;
pub mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
