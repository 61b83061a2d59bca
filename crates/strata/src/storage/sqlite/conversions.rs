//! SQLite row conversion functions.
//!
//! Pure functions for converting between SQLite rows and the snapshot
//! hierarchy. Testable without database access.

use std::collections::HashMap;

use rusqlite::Row;
use strata_core::snapshot::{Category, Group, Item};

/// One row of any of the three node tables.
///
/// Expected columns: id, parent_id, name, sort_order, is_active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub sort_order: i32,
    pub is_active: bool,
}

pub fn row_to_node(row: &Row) -> rusqlite::Result<NodeRow> {
    Ok(NodeRow {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
        sort_order: row.get(3)?,
        is_active: row.get(4)?,
    })
}

/// Builds the group tree from flat rows.
///
/// Children whose parent is absent (filtered out as inactive, or missing)
/// are dropped along with their own children.
pub fn assemble(groups: Vec<NodeRow>, categories: Vec<NodeRow>, items: Vec<NodeRow>) -> Vec<Group> {
    let mut items_by_category: HashMap<i64, Vec<Item>> = HashMap::new();
    for row in items {
        if let Some(category_id) = row.parent_id {
            items_by_category.entry(category_id).or_default().push(Item {
                id: row.id,
                name: row.name,
                sort_order: row.sort_order,
                is_active: row.is_active,
            });
        }
    }

    let mut categories_by_group: HashMap<i64, Vec<Category>> = HashMap::new();
    for row in categories {
        if let Some(group_id) = row.parent_id {
            categories_by_group.entry(group_id).or_default().push(Category {
                id: row.id,
                name: row.name,
                sort_order: row.sort_order,
                is_active: row.is_active,
                items: items_by_category.remove(&row.id).unwrap_or_default(),
            });
        }
    }

    groups
        .into_iter()
        .map(|row| Group {
            id: row.id,
            name: row.name,
            sort_order: row.sort_order,
            is_active: row.is_active,
            categories: categories_by_group.remove(&row.id).unwrap_or_default(),
        })
        .collect()
}
