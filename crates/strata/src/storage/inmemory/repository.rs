use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use strata_core::snapshot::{Group, Snapshot};
use strata_core::storage::{Result, SnapshotRepository};

/// In-memory storage backend.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    groups: Arc<RwLock<Vec<Group>>>,
}

impl InMemoryRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding `groups`.
    pub fn with_groups(groups: Vec<Group>) -> Self {
        Self {
            groups: Arc::new(RwLock::new(groups)),
        }
    }

    /// Replaces the stored hierarchy.
    pub async fn replace(&self, groups: Vec<Group>) {
        *self.groups.write().await = groups;
    }

    /// Sets the active flag of an item. Returns false if no item has that id.
    pub async fn set_item_active(&self, item_id: i64, is_active: bool) -> bool {
        let mut groups = self.groups.write().await;
        let item = groups
            .iter_mut()
            .flat_map(|g| g.categories.iter_mut())
            .flat_map(|c| c.items.iter_mut())
            .find(|i| i.id == item_id);

        match item {
            Some(item) => {
                item.is_active = is_active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn load_groups(&self, include_inactive: bool) -> Result<Vec<Group>> {
        let groups = self.groups.read().await.clone();
        if include_inactive {
            return Ok(groups);
        }
        Ok(Snapshot::new(groups).only_active().groups().to_vec())
    }
}
