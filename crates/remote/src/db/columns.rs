use async_trait::async_trait;
use db::{
    models::{
        RepositoryError,
        column::{Column, ColumnRepository, CreateColumn, UpdateColumn},
    },
    ordering,
};
use sqlx::PgPool;

/// Columns stored in a board's own Postgres database.
#[derive(Clone)]
pub struct PgColumnRepository {
    pool: PgPool,
}

impl PgColumnRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ColumnRepository for PgColumnRepository {
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
        // COALESCE keeps the stored value for fields left as None.
        let column = sqlx::query_as::<_, Column>(
            r#"UPDATE columns
               SET name = COALESCE($2, name),
                   is_done_column = COALESCE($3, is_done_column)
               WHERE id = $1
               RETURNING id, board_id, name, position, is_done_column, created_at"#,
        )
        .bind(id)
        .bind(data.name.as_deref())
        .bind(data.is_done_column)
        .fetch_optional(&self.pool)
        .await?;
        column.ok_or(RepositoryError::NotFound { entity: "column", id })
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
