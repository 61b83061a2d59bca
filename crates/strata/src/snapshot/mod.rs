//! Tiered snapshot read path and background export.

mod export_queue;
mod exporter;
mod refresh_handler;
mod service;

pub use export_queue::ExportQueue;
pub use exporter::SnapshotExporter;
pub use refresh_handler::{SnapshotRefreshHandler, CLASSIFICATION_AGGREGATE};
pub use service::SnapshotService;
