//! Dense positional ordering for entities scoped to a parent.
//!
//! Columns (parent: board), cards (parent: column) and checklist items
//! (parent: card) all keep an integer `position` that must stay exactly
//! `0..n` within their parent. The functions here are the only code that
//! renumbers positions; repositories call them inside a transaction they own,
//! so a failure at any step rolls back the whole renumbering.
//!
//! The algorithm is written once against [`PositionStore`], which is
//! implemented for both the local SQLite connection and the external Postgres
//! connection. The entity type picks the table and parent column through
//! [`OrderedEntity`].

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, Sqlite, SqliteConnection};

use crate::models::RepositoryError;

/// An entity kept in a dense ordering under a parent row.
pub trait OrderedEntity: Send + Sync + 'static {
    /// Name used in error messages ("card", "column", ...).
    const ENTITY: &'static str;
    const TABLE: &'static str;
    const PARENT_COLUMN: &'static str;
}

/// Table and parent column of an ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub table: &'static str,
    pub parent_column: &'static str,
}

impl Scope {
    pub fn of<E: OrderedEntity>() -> Self {
        Self {
            table: E::TABLE,
            parent_column: E::PARENT_COLUMN,
        }
    }
}

/// Where an entity sits: its parent and its index within that parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub parent_id: i64,
    pub position: i32,
}

/// Result of a move: the placement before and after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub from: Placement,
    pub to: Placement,
}

impl Relocation {
    pub fn changed_parent(&self) -> bool {
        self.from.parent_id != self.to.parent_id
    }
}

/// Row-level primitives the ordering algorithm needs from a connection.
///
/// Every method runs a single statement; atomicity comes from the caller's
/// transaction.
#[async_trait]
pub trait PositionStore: Send {
    /// Serialize position writers on `scope.table` until the transaction ends.
    async fn lock_siblings(&mut self, scope: Scope) -> Result<(), sqlx::Error>;

    async fn placement(&mut self, scope: Scope, id: i64) -> Result<Option<Placement>, sqlx::Error>;

    /// Identifiers of all children of `parent_id`, in position order.
    async fn child_ids(&mut self, scope: Scope, parent_id: i64) -> Result<Vec<i64>, sqlx::Error>;

    async fn max_position(
        &mut self,
        scope: Scope,
        parent_id: i64,
    ) -> Result<Option<i32>, sqlx::Error>;

    /// Add `delta` to every position of `parent_id` within `from..=to`.
    async fn shift(
        &mut self,
        scope: Scope,
        parent_id: i64,
        from: i32,
        to: i32,
        delta: i32,
    ) -> Result<u64, sqlx::Error>;

    async fn place(&mut self, scope: Scope, id: i64, at: Placement) -> Result<(), sqlx::Error>;

    async fn delete_row(&mut self, scope: Scope, id: i64) -> Result<u64, sqlx::Error>;
}

fn sqlite_lock_sql(table: &str) -> String {
    // A write statement as the first statement of the transaction takes the
    // database write lock; the busy timeout makes concurrent writers wait.
    format!("UPDATE {table} SET position = position WHERE 0")
}

fn postgres_lock_sql(table: &str) -> String {
    format!("SELECT pg_advisory_xact_lock(hashtext('{table}')::bigint)")
}

macro_rules! impl_position_store {
    ($conn:ty, $db:ty, $lock_sql:path) => {
        #[async_trait]
        impl PositionStore for $conn {
            async fn lock_siblings(&mut self, scope: Scope) -> Result<(), sqlx::Error> {
                let sql = $lock_sql(scope.table);
                sqlx::query::<$db>(&sql).execute(&mut *self).await?;
                Ok(())
            }

            async fn placement(
                &mut self,
                scope: Scope,
                id: i64,
            ) -> Result<Option<Placement>, sqlx::Error> {
                let sql = format!(
                    "SELECT {}, position FROM {} WHERE id = $1",
                    scope.parent_column, scope.table
                );
                let row = sqlx::query_as::<$db, (i64, i32)>(&sql)
                    .bind(id)
                    .fetch_optional(&mut *self)
                    .await?;
                Ok(row.map(|(parent_id, position)| Placement {
                    parent_id,
                    position,
                }))
            }

            async fn child_ids(
                &mut self,
                scope: Scope,
                parent_id: i64,
            ) -> Result<Vec<i64>, sqlx::Error> {
                let sql = format!(
                    "SELECT id FROM {} WHERE {} = $1 ORDER BY position, id",
                    scope.table, scope.parent_column
                );
                sqlx::query_scalar::<$db, i64>(&sql)
                    .bind(parent_id)
                    .fetch_all(&mut *self)
                    .await
            }

            async fn max_position(
                &mut self,
                scope: Scope,
                parent_id: i64,
            ) -> Result<Option<i32>, sqlx::Error> {
                let sql = format!(
                    "SELECT MAX(position) FROM {} WHERE {} = $1",
                    scope.table, scope.parent_column
                );
                sqlx::query_scalar::<$db, Option<i32>>(&sql)
                    .bind(parent_id)
                    .fetch_one(&mut *self)
                    .await
            }

            async fn shift(
                &mut self,
                scope: Scope,
                parent_id: i64,
                from: i32,
                to: i32,
                delta: i32,
            ) -> Result<u64, sqlx::Error> {
                let sql = format!(
                    "UPDATE {} SET position = position + $1 \
                     WHERE {} = $2 AND position >= $3 AND position <= $4",
                    scope.table, scope.parent_column
                );
                let result = sqlx::query::<$db>(&sql)
                    .bind(delta)
                    .bind(parent_id)
                    .bind(from)
                    .bind(to)
                    .execute(&mut *self)
                    .await?;
                Ok(result.rows_affected())
            }

            async fn place(
                &mut self,
                scope: Scope,
                id: i64,
                at: Placement,
            ) -> Result<(), sqlx::Error> {
                let sql = format!(
                    "UPDATE {} SET {} = $1, position = $2 WHERE id = $3",
                    scope.table, scope.parent_column
                );
                sqlx::query::<$db>(&sql)
                    .bind(at.parent_id)
                    .bind(at.position)
                    .bind(id)
                    .execute(&mut *self)
                    .await?;
                Ok(())
            }

            async fn delete_row(&mut self, scope: Scope, id: i64) -> Result<u64, sqlx::Error> {
                let sql = format!("DELETE FROM {} WHERE id = $1", scope.table);
                let result = sqlx::query::<$db>(&sql)
                    .bind(id)
                    .execute(&mut *self)
                    .await?;
                Ok(result.rows_affected())
            }
        }
    };
}

impl_position_store!(SqliteConnection, Sqlite, sqlite_lock_sql);
impl_position_store!(PgConnection, Postgres, postgres_lock_sql);

/// Position for a new entity appended to the end of `parent_id`'s list.
///
/// Takes the sibling lock, so the caller must insert the row in the same
/// transaction.
pub async fn next_position<E, C>(conn: &mut C, parent_id: i64) -> Result<i32, RepositoryError>
where
    E: OrderedEntity,
    C: PositionStore + ?Sized,
{
    let scope = Scope::of::<E>();
    conn.lock_siblings(scope).await?;
    let max = conn.max_position(scope, parent_id).await?;
    Ok(max.map_or(0, |m| m + 1))
}

/// Move entity `id` to `position` under `parent_id`, closing the gap it
/// leaves and opening one where it lands.
///
/// Positions past the end of the destination list are clamped to the end.
pub async fn relocate<E, C>(
    conn: &mut C,
    id: i64,
    parent_id: i64,
    position: i32,
) -> Result<Relocation, RepositoryError>
where
    E: OrderedEntity,
    C: PositionStore + ?Sized,
{
    relocate_inner::<E, C>(conn, id, Some(parent_id), position).await
}

/// Move entity `id` to `position` within its current parent.
pub async fn relocate_within<E, C>(
    conn: &mut C,
    id: i64,
    position: i32,
) -> Result<Relocation, RepositoryError>
where
    E: OrderedEntity,
    C: PositionStore + ?Sized,
{
    relocate_inner::<E, C>(conn, id, None, position).await
}

async fn relocate_inner<E, C>(
    conn: &mut C,
    id: i64,
    parent_id: Option<i64>,
    position: i32,
) -> Result<Relocation, RepositoryError>
where
    E: OrderedEntity,
    C: PositionStore + ?Sized,
{
    if position < 0 {
        return Err(RepositoryError::InvalidOrder(format!(
            "position {position} is negative"
        )));
    }

    let scope = Scope::of::<E>();
    conn.lock_siblings(scope).await?;

    let from = conn
        .placement(scope, id)
        .await?
        .ok_or(RepositoryError::NotFound {
            entity: E::ENTITY,
            id,
        })?;
    let parent_id = parent_id.unwrap_or(from.parent_id);

    let target = if from.parent_id == parent_id {
        let last = conn.max_position(scope, parent_id).await?.unwrap_or(0);
        let target = position.min(last);
        if target > from.position {
            conn.shift(scope, parent_id, from.position + 1, target, -1)
                .await?;
        } else if target < from.position {
            conn.shift(scope, parent_id, target, from.position - 1, 1)
                .await?;
        }
        target
    } else {
        let len = conn
            .max_position(scope, parent_id)
            .await?
            .map_or(0, |m| m + 1);
        let target = position.min(len);
        conn.shift(scope, from.parent_id, from.position + 1, i32::MAX, -1)
            .await?;
        conn.shift(scope, parent_id, target, i32::MAX, 1).await?;
        target
    };

    let to = Placement {
        parent_id,
        position: target,
    };
    conn.place(scope, id, to).await?;

    Ok(Relocation { from, to })
}

/// Assign `position = index` to every child of `parent_id` following
/// `ordered_ids`.
///
/// The list must name every current child exactly once; anything else is
/// rejected before a row is touched.
pub async fn reorder<E, C>(
    conn: &mut C,
    parent_id: i64,
    ordered_ids: &[i64],
) -> Result<(), RepositoryError>
where
    E: OrderedEntity,
    C: PositionStore + ?Sized,
{
    let scope = Scope::of::<E>();
    conn.lock_siblings(scope).await?;

    let mut current = conn.child_ids(scope, parent_id).await?;
    let mut requested = ordered_ids.to_vec();
    current.sort_unstable();
    requested.sort_unstable();
    if current != requested {
        return Err(RepositoryError::InvalidOrder(format!(
            "expected each of the {} {}s under {} {} exactly once, got {:?}",
            current.len(),
            E::ENTITY,
            E::PARENT_COLUMN,
            parent_id,
            ordered_ids
        )));
    }

    for (index, id) in ordered_ids.iter().enumerate() {
        let position = i32::try_from(index).map_err(|_| {
            RepositoryError::InvalidOrder(format!("list of {} is too long", E::ENTITY))
        })?;
        conn.place(
            scope,
            *id,
            Placement {
                parent_id,
                position,
            },
        )
        .await?;
    }

    Ok(())
}

/// Delete entity `id` and close the gap it leaves.
///
/// Returns where the entity was, or `None` if it did not exist.
pub async fn remove<E, C>(conn: &mut C, id: i64) -> Result<Option<Placement>, RepositoryError>
where
    E: OrderedEntity,
    C: PositionStore + ?Sized,
{
    let scope = Scope::of::<E>();
    conn.lock_siblings(scope).await?;

    let Some(at) = conn.placement(scope, id).await? else {
        return Ok(None);
    };
    conn.delete_row(scope, id).await?;
    conn.shift(scope, at.parent_id, at.position + 1, i32::MAX, -1)
        .await?;

    Ok(Some(at))
}
