use async_trait::async_trait;

use crate::snapshot::Group;

use super::Result;

/// Source of truth for the snapshot hierarchy.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Loads every group with its categories and items.
    ///
    /// When `include_inactive` is false, inactive nodes and their subtrees
    /// are left out. Ordering is not guaranteed; callers build a
    /// [`crate::snapshot::Snapshot`] which sorts.
    async fn load_groups(&self, include_inactive: bool) -> Result<Vec<Group>>;
}
