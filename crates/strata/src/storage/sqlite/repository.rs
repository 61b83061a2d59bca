//! SQLite repository implementation.

use async_trait::async_trait;
use tokio_rusqlite::Connection;

use strata_core::snapshot::Group;
use strata_core::storage::{RepositoryError, Result, SnapshotRepository};

use super::conversions::{assemble, row_to_node, NodeRow};
use super::error::map_tokio_rusqlite_error;
use super::schema;

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

fn query_nodes(
    conn: &rusqlite::Connection,
    sql: &str,
    include_inactive: bool,
) -> std::result::Result<Vec<NodeRow>, tokio_rusqlite::Error> {
    let mut stmt = conn.prepare(sql).map_err(wrap_err)?;
    let rows = stmt
        .query_map([include_inactive], row_to_node)
        .map_err(wrap_err)?;

    let mut nodes = Vec::new();
    for row_result in rows {
        nodes.push(row_result.map_err(wrap_err)?);
    }
    Ok(nodes)
}

/// SQLite-backed snapshot repository.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Opens (or creates) a file-based database and ensures the schema exists.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Creates a repository with an in-memory database.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    async fn init_schema(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(schema::CREATE_TABLES)
                .map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(map_tokio_rusqlite_error)
    }

    /// Inserts or replaces every node of `groups` in one transaction.
    pub async fn upsert_groups(&self, groups: Vec<Group>) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                for group in &groups {
                    tx.execute(
                        schema::UPSERT_GROUP,
                        rusqlite::params![group.id, group.name, group.sort_order, group.is_active],
                    )
                    .map_err(wrap_err)?;
                    for category in &group.categories {
                        tx.execute(
                            schema::UPSERT_CATEGORY,
                            rusqlite::params![
                                category.id,
                                group.id,
                                category.name,
                                category.sort_order,
                                category.is_active
                            ],
                        )
                        .map_err(wrap_err)?;
                        for item in &category.items {
                            tx.execute(
                                schema::UPSERT_ITEM,
                                rusqlite::params![
                                    item.id,
                                    category.id,
                                    item.name,
                                    item.sort_order,
                                    item.is_active
                                ],
                            )
                            .map_err(wrap_err)?;
                        }
                    }
                }
                tx.commit().map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(map_tokio_rusqlite_error)
    }

    /// True when no group has been stored yet.
    pub async fn is_empty(&self) -> Result<bool> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row(schema::COUNT_GROUPS, [], |row| row.get(0))
                    .map_err(wrap_err)?;
                Ok(count == 0)
            })
            .await
            .map_err(map_tokio_rusqlite_error)
    }
}

#[async_trait]
impl SnapshotRepository for SqliteRepository {
    async fn load_groups(&self, include_inactive: bool) -> Result<Vec<Group>> {
        let (groups, categories, items) = self
            .conn
            .call(move |conn| {
                let groups = query_nodes(conn, schema::SELECT_GROUPS, include_inactive)?;
                let categories = query_nodes(conn, schema::SELECT_CATEGORIES, include_inactive)?;
                let items = query_nodes(conn, schema::SELECT_ITEMS, include_inactive)?;
                Ok((groups, categories, items))
            })
            .await
            .map_err(map_tokio_rusqlite_error)?;

        tracing::trace!(
            include_inactive,
            groups = groups.len(),
            categories = categories.len(),
            items = items.len(),
            "loaded snapshot rows"
        );

        Ok(assemble(groups, categories, items))
    }
}
