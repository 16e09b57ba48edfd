use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::RepositoryError;
use crate::ordering::{self, OrderedEntity};

/// A column of a board. `position` is dense within the board.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Column {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub position: i32,
    /// Cards entering this column are stamped as completed.
    pub is_done_column: bool,
    pub created_at: DateTime<Utc>,
}

impl OrderedEntity for Column {
    const ENTITY: &'static str = "column";
    const TABLE: &'static str = "columns";
    const PARENT_COLUMN: &'static str = "board_id";
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateColumn {
    pub board_id: i64,
    pub name: String,
    #[serde(default)]
    pub is_done_column: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateColumn {
    pub name: Option<String>,
    pub is_done_column: Option<bool>,
}

#[async_trait]
pub trait ColumnRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Column>, RepositoryError>;

    /// Columns of a board in position order.
    async fn find_by_board(&self, board_id: i64) -> Result<Vec<Column>, RepositoryError>;

    /// Append a column to the end of its board.
    async fn create(&self, data: &CreateColumn) -> Result<Column, RepositoryError>;

    async fn update(&self, id: i64, data: &UpdateColumn) -> Result<Column, RepositoryError>;

    /// Delete a column (and its cards) and close the gap it leaves.
    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;

    /// Move a column to `position` within its board.
    async fn move_to(&self, id: i64, position: i32) -> Result<Column, RepositoryError>;

    async fn reorder(&self, board_id: i64, column_ids: &[i64]) -> Result<(), RepositoryError>;
}

/// Columns stored in the local SQLite database.
#[derive(Clone)]
pub struct LocalColumnRepository {
    pool: SqlitePool,
}

impl LocalColumnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ColumnRepository for LocalColumnRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Column>, RepositoryError> {
        let column = sqlx::query_as::<_, Column>(
            r#"SELECT id, board_id, name, position, is_done_column, created_at
               FROM columns
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(column)
    }

    async fn find_by_board(&self, board_id: i64) -> Result<Vec<Column>, RepositoryError> {
        let columns = sqlx::query_as::<_, Column>(
            r#"SELECT id, board_id, name, position, is_done_column, created_at
               FROM columns
               WHERE board_id = $1
               ORDER BY position, id"#,
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(columns)
    }

    async fn create(&self, data: &CreateColumn) -> Result<Column, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let position = ordering::next_position::<Column, _>(&mut *tx, data.board_id).await?;
        let column = sqlx::query_as::<_, Column>(
            r#"INSERT INTO columns (board_id, name, position, is_done_column)
               VALUES ($1, $2, $3, $4)
               RETURNING id, board_id, name, position, is_done_column, created_at"#,
        )
        .bind(data.board_id)
        .bind(&data.name)
        .bind(position)
        .bind(data.is_done_column)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(column)
    }

    async fn update(&self, id: i64, data: &UpdateColumn) -> Result<Column, RepositoryError> {
        sqlx::query_as::<_, Column>(
            r#"UPDATE columns
               SET name = COALESCE($2, name),
                   is_done_column = COALESCE($3, is_done_column)
               WHERE id = $1
               RETURNING id, board_id, name, position, is_done_column, created_at"#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.is_done_column)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound { entity: "column", id })
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ordering::remove::<Column, _>(&mut *tx, id)
            .await?
            .ok_or(RepositoryError::NotFound { entity: "column", id })?;
        tx.commit().await?;
        Ok(())
    }

    async fn move_to(&self, id: i64, position: i32) -> Result<Column, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ordering::relocate_within::<Column, _>(&mut *tx, id, position).await?;
        let column = sqlx::query_as::<_, Column>(
            r#"SELECT id, board_id, name, position, is_done_column, created_at
               FROM columns
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(column)
    }

    async fn reorder(&self, board_id: i64, column_ids: &[i64]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ordering::reorder::<Column, _>(&mut *tx, board_id, column_ids).await?;
        tx.commit().await?;
        Ok(())
    }
}
