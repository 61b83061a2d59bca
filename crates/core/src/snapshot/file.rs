//! Object-store file format for exported snapshots.
//!
//! The file flattens the three typed levels into one recursive node shape:
//!
//! ```json
//! {
//!   "schemaVersion": "1.0",
//!   "lastUpdated": "2025-01-14T10:30:00Z",
//!   "source": "strata repository export",
//!   "items": [
//!     { "id": 1, "name": "Language", "sortOrder": 1, "isActive": true, "children": [ ... ] }
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SnapshotFileError;
use super::types::{Category, Group, Item, Snapshot};

/// Current file schema version.
pub const SCHEMA_VERSION: &str = "1.0";

/// Default `source` value written on export.
pub const DEFAULT_SOURCE: &str = "strata repository export";

/// One node of the exported hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: i64,
    pub name: String,
    pub sort_order: i32,
    pub is_active: bool,
    #[serde(default)]
    pub children: Vec<FileNode>,
}

/// Exported snapshot with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub schema_version: String,
    pub last_updated: DateTime<Utc>,
    pub source: String,
    pub items: Vec<FileNode>,
}

impl SnapshotFile {
    /// Builds the file model for a snapshot.
    pub fn from_snapshot(
        snapshot: &Snapshot,
        source: impl Into<String>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let items = snapshot
            .groups()
            .iter()
            .map(|g| FileNode {
                id: g.id,
                name: g.name.clone(),
                sort_order: g.sort_order,
                is_active: g.is_active,
                children: g
                    .categories
                    .iter()
                    .map(|c| FileNode {
                        id: c.id,
                        name: c.name.clone(),
                        sort_order: c.sort_order,
                        is_active: c.is_active,
                        children: c
                            .items
                            .iter()
                            .map(|i| FileNode {
                                id: i.id,
                                name: i.name.clone(),
                                sort_order: i.sort_order,
                                is_active: i.is_active,
                                children: Vec::new(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            last_updated,
            source: source.into(),
            items,
        }
    }

    /// Rebuilds the typed snapshot.
    ///
    /// Fails if the schema version is unknown or a leaf carries children.
    pub fn into_snapshot(self) -> Result<Snapshot, SnapshotFileError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(SnapshotFileError::UnsupportedSchema(self.schema_version));
        }

        let mut groups = Vec::with_capacity(self.items.len());
        for group in self.items {
            let mut categories = Vec::with_capacity(group.children.len());
            for category in group.children {
                let mut items = Vec::with_capacity(category.children.len());
                for item in category.children {
                    if !item.children.is_empty() {
                        return Err(SnapshotFileError::TooDeep { id: item.id });
                    }
                    items.push(Item {
                        id: item.id,
                        name: item.name,
                        sort_order: item.sort_order,
                        is_active: item.is_active,
                    });
                }
                categories.push(Category {
                    id: category.id,
                    name: category.name,
                    sort_order: category.sort_order,
                    is_active: category.is_active,
                    items,
                });
            }
            groups.push(Group {
                id: group.id,
                name: group.name,
                sort_order: group.sort_order,
                is_active: group.is_active,
                categories,
            });
        }

        Ok(Snapshot::new(groups))
    }

    /// Serializes to indented JSON bytes.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, SnapshotFileError> {
        serde_json::to_vec_pretty(self).map_err(|e| SnapshotFileError::Encode(e.to_string()))
    }

    /// Parses JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SnapshotFileError> {
        serde_json::from_slice(bytes).map_err(|e| SnapshotFileError::Decode(e.to_string()))
    }
}
