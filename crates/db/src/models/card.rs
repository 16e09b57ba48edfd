use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::RepositoryError;
use crate::ordering::{self, OrderedEntity};

/// A card within a column. `position` is dense within the column.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub column_id: i64,
    pub title: String,
    pub description: String,
    pub position: i32,
    /// Set while the card sits in a done column.
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderedEntity for Card {
    const ENTITY: &'static str = "card";
    const TABLE: &'static str = "cards";
    const PARENT_COLUMN: &'static str = "column_id";
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCard {
    pub column_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCard {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[async_trait]
pub trait CardRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Card>, RepositoryError>;

    /// Cards of a column in position order.
    async fn find_by_column(&self, column_id: i64) -> Result<Vec<Card>, RepositoryError>;

    /// Append a card to the end of its column.
    async fn create(&self, data: &CreateCard) -> Result<Card, RepositoryError>;

    async fn update(&self, id: i64, data: &UpdateCard) -> Result<Card, RepositoryError>;

    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;

    /// Move a card to `position` in `column_id` and set its completion
    /// timestamp, in one transaction.
    async fn move_card(
        &self,
        id: i64,
        column_id: i64,
        position: i32,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Card, RepositoryError>;

    async fn reorder(&self, column_id: i64, card_ids: &[i64]) -> Result<(), RepositoryError>;
}

#[derive(Clone)]
pub struct LocalCardRepository {
    pool: SqlitePool,
}

impl LocalCardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CardRepository for LocalCardRepository {
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
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let position = ordering::next_position::<Card, _>(&mut *tx, data.column_id).await?;
        let card = sqlx::query_as::<_, Card>(
            r#"INSERT INTO cards (column_id, title, description, position, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $5)
               RETURNING id, column_id, title, description, position, completed_at, created_at, updated_at"#,
        )
        .bind(data.column_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(position)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(card)
    }

    async fn update(&self, id: i64, data: &UpdateCard) -> Result<Card, RepositoryError> {
        sqlx::query_as::<_, Card>(
            r#"UPDATE cards
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   updated_at = $4
               WHERE id = $1
               RETURNING id, column_id, title, description, position, completed_at, created_at, updated_at"#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound { entity: "card", id })
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
               SET completed_at = $2, updated_at = $3
               WHERE id = $1
               RETURNING id, column_id, title, description, position, completed_at, created_at, updated_at"#,
        )
        .bind(id)
        .bind(completed_at)
        .bind(Utc::now())
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
