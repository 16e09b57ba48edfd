use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::{
    models::{
        RepositoryError,
        card::{Card, CardRepository, CreateCard, UpdateCard},
    },
    ordering,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgCardRepository {
    pool: PgPool,
}

impl PgCardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CardRepository for PgCardRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Card>, RepositoryError> {
        let card = sqlx::query_as::<_, Card>(
            r#"SELECT id, column_id, title, description, position, completed_at, created_at, updated_at
               FROM cards
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(card)
    }

    async fn find_by_column(&self, column_id: i64) -> Result<Vec<Card>, RepositoryError> {
        let cards = sqlx::query_as::<_, Card>(
            r#"SELECT id, column_id, title, description, position, completed_at, created_at, updated_at
               FROM cards
               WHERE column_id = $1
               ORDER BY position, id"#,
        )
        .bind(column_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(cards)
    }

    async fn create(&self, data: &CreateCard) -> Result<Card, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let position = ordering::next_position::<Card, _>(&mut *tx, data.column_id).await?;
        let card = sqlx::query_as::<_, Card>(
            r#"INSERT INTO cards (column_id, title, description, position)
               VALUES ($1, $2, $3, $4)
               RETURNING id, column_id, title, description, position, completed_at, created_at, updated_at"#,
        )
        .bind(data.column_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(position)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(card)
    }

    async fn update(&self, id: i64, data: &UpdateCard) -> Result<Card, RepositoryError> {
        let card = sqlx::query_as::<_, Card>(
            r#"UPDATE cards
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING id, column_id, title, description, position, completed_at, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.title.as_deref())
        .bind(data.description.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        card.ok_or(RepositoryError::NotFound { entity: "card", id })
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ordering::remove::<Card, _>(&mut *tx, id)
            .await?
            .ok_or(RepositoryError::NotFound { entity: "card", id })?;
        tx.commit().await?;
        Ok(())
    }

    async fn move_card(
        &self,
        id: i64,
        column_id: i64,
        position: i32,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Card, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ordering::relocate::<Card, _>(&mut *tx, id, column_id, position).await?;
        let card = sqlx::query_as::<_, Card>(
            r#"UPDATE cards
               SET completed_at = $2, updated_at = NOW()
               WHERE id = $1
               RETURNING id, column_id, title, description, position, completed_at, created_at, updated_at"#,
        )
        .bind(id)
        .bind(completed_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(card)
    }

    async fn reorder(&self, column_id: i64, card_ids: &[i64]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ordering::reorder::<Card, _>(&mut *tx, column_id, card_ids).await?;
        tx.commit().await?;
        Ok(())
    }
}
