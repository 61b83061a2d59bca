//! SQLite schema definitions and SQL query constants.
//!
//! Pure data, no I/O.

/// SQL statement to create all tables.
pub const CREATE_TABLES: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS snapshot_groups (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS snapshot_categories (
    id INTEGER PRIMARY KEY,
    group_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (group_id) REFERENCES snapshot_groups(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS snapshot_items (
    id INTEGER PRIMARY KEY,
    category_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (category_id) REFERENCES snapshot_categories(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_snapshot_categories_group_id ON snapshot_categories(group_id);
CREATE INDEX IF NOT EXISTS idx_snapshot_items_category_id ON snapshot_items(category_id);
"#;

// `?1` is the include_inactive flag.

pub const SELECT_GROUPS: &str = r#"
SELECT id, NULL, name, sort_order, is_active
FROM snapshot_groups
WHERE ?1 OR is_active = 1
"#;

pub const SELECT_CATEGORIES: &str = r#"
SELECT id, group_id, name, sort_order, is_active
FROM snapshot_categories
WHERE ?1 OR is_active = 1
"#;

pub const SELECT_ITEMS: &str = r#"
SELECT id, category_id, name, sort_order, is_active
FROM snapshot_items
WHERE ?1 OR is_active = 1
"#;

pub const UPSERT_GROUP: &str = r#"
INSERT INTO snapshot_groups (id, name, sort_order, is_active)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(id) DO UPDATE SET
    name = excluded.name,
    sort_order = excluded.sort_order,
    is_active = excluded.is_active
"#;

pub const UPSERT_CATEGORY: &str = r#"
INSERT INTO snapshot_categories (id, group_id, name, sort_order, is_active)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(id) DO UPDATE SET
    group_id = excluded.group_id,
    name = excluded.name,
    sort_order = excluded.sort_order,
    is_active = excluded.is_active
"#;

pub const UPSERT_ITEM: &str = r#"
INSERT INTO snapshot_items (id, category_id, name, sort_order, is_active)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(id) DO UPDATE SET
    category_id = excluded.category_id,
    name = excluded.name,
    sort_order = excluded.sort_order,
    is_active = excluded.is_active
"#;

pub const COUNT_GROUPS: &str = "SELECT COUNT(*) FROM snapshot_groups";
