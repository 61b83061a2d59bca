use serde::{Deserialize, Serialize};

/// Which slice of the dataset a read covers.
///
/// The two views are cached, versioned and exported independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotView {
    /// Only active groups, categories and items.
    ActiveOnly,
    /// Every node regardless of its active flag.
    All,
}

impl SnapshotView {
    /// Maps the `include_inactive` request flag to a view.
    pub fn from_include_inactive(include_inactive: bool) -> Self {
        if include_inactive {
            Self::All
        } else {
            Self::ActiveOnly
        }
    }

    /// Returns true if inactive nodes belong to this view.
    pub fn includes_inactive(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Short label used in cache keys, object prefixes and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActiveOnly => "active",
            Self::All => "all",
        }
    }

    /// Both views, in a stable order.
    pub fn all() -> [SnapshotView; 2] {
        [Self::ActiveOnly, Self::All]
    }
}

impl std::fmt::Display for SnapshotView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leaf of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub sort_order: i32,
    pub is_active: bool,
}

impl Item {
    pub fn new(id: i64, name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            id,
            name: name.into(),
            sort_order,
            is_active: true,
        }
    }

    /// Marks the item as inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Second level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub items: Vec<Item>,
}

impl Category {
    pub fn new(id: i64, name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            id,
            name: name.into(),
            sort_order,
            is_active: true,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Top level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub sort_order: i32,
    pub is_active: bool,
    pub categories: Vec<Category>,
}

impl Group {
    pub fn new(id: i64, name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            id,
            name: name.into(),
            sort_order,
            is_active: true,
            categories: Vec::new(),
        }
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// The full hierarchical dataset returned by a read.
///
/// A `Snapshot` is immutable once built: there are no mutating methods and
/// the fields are private. Derived snapshots (e.g. [`Snapshot::only_active`])
/// are new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    groups: Vec<Group>,
}

impl Snapshot {
    /// Builds a snapshot, ordering every level by `(sort_order, id)`.
    pub fn new(mut groups: Vec<Group>) -> Self {
        groups.sort_by_key(|g| (g.sort_order, g.id));
        for group in &mut groups {
            group.categories.sort_by_key(|c| (c.sort_order, c.id));
            for category in &mut group.categories {
                category.items.sort_by_key(|i| (i.sort_order, i.id));
            }
        }
        Self { groups }
    }

    /// An empty snapshot.
    pub fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn category_count(&self) -> usize {
        self.groups.iter().map(|g| g.categories.len()).sum()
    }

    pub fn item_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.categories.iter())
            .map(|c| c.items.len())
            .sum()
    }

    /// Returns a new snapshot with every inactive node (and its subtree) removed.
    pub fn only_active(&self) -> Self {
        let groups = self
            .groups
            .iter()
            .filter(|g| g.is_active)
            .map(|g| Group {
                categories: g
                    .categories
                    .iter()
                    .filter(|c| c.is_active)
                    .map(|c| Category {
                        items: c.items.iter().filter(|i| i.is_active).cloned().collect(),
                        ..c.clone()
                    })
                    .collect(),
                ..g.clone()
            })
            .collect();
        Self { groups }
    }

    /// Narrows the snapshot to what the given view may contain.
    pub fn for_view(&self, view: SnapshotView) -> Self {
        match view {
            SnapshotView::All => self.clone(),
            SnapshotView::ActiveOnly => self.only_active(),
        }
    }
}
