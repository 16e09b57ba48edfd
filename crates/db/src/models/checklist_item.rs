use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::RepositoryError;
use crate::ordering::{self, OrderedEntity};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: i64,
    pub card_id: i64,
    pub content: String,
    pub is_completed: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl OrderedEntity for ChecklistItem {
    const ENTITY: &'static str = "checklist item";
    const TABLE: &'static str = "checklist_items";
    const PARENT_COLUMN: &'static str = "card_id";
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChecklistItem {
    pub card_id: i64,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateChecklistItem {
    pub content: Option<String>,
    pub is_completed: Option<bool>,
}

#[async_trait]
pub trait ChecklistRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<ChecklistItem>, RepositoryError>;

    async fn find_by_card(&self, card_id: i64) -> Result<Vec<ChecklistItem>, RepositoryError>;

    async fn create(&self, data: &CreateChecklistItem) -> Result<ChecklistItem, RepositoryError>;

    async fn update(
        &self,
        id: i64,
        data: &UpdateChecklistItem,
    ) -> Result<ChecklistItem, RepositoryError>;

    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;

    /// Move an item to `position` on `card_id`, which may be another card.
    async fn move_item(
        &self,
        id: i64,
        card_id: i64,
        position: i32,
    ) -> Result<ChecklistItem, RepositoryError>;

    async fn reorder(&self, card_id: i64, item_ids: &[i64]) -> Result<(), RepositoryError>;
}

#[derive(Clone)]
pub struct LocalChecklistRepository {
    pool: SqlitePool,
}

impl LocalChecklistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChecklistRepository for LocalChecklistRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<ChecklistItem>, RepositoryError> {
        let item = sqlx::query_as::<_, ChecklistItem>(
            r#"SELECT id, card_id, content, is_completed, position, created_at
               FROM checklist_items
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn find_by_card(&self, card_id: i64) -> Result<Vec<ChecklistItem>, RepositoryError> {
        let items = sqlx::query_as::<_, ChecklistItem>(
            r#"SELECT id, card_id, content, is_completed, position, created_at
               FROM checklist_items
               WHERE card_id = $1
               ORDER BY position, id"#,
        )
        .bind(card_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn create(&self, data: &CreateChecklistItem) -> Result<ChecklistItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let position = ordering::next_position::<ChecklistItem, _>(&mut *tx, data.card_id).await?;
        let item = sqlx::query_as::<_, ChecklistItem>(
            r#"INSERT INTO checklist_items (card_id, content, position)
               VALUES ($1, $2, $3)
               RETURNING id, card_id, content, is_completed, position, created_at"#,
        )
        .bind(data.card_id)
        .bind(&data.content)
        .bind(position)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn update(
        &self,
        id: i64,
        data: &UpdateChecklistItem,
    ) -> Result<ChecklistItem, RepositoryError> {
        sqlx::query_as::<_, ChecklistItem>(
            r#"UPDATE checklist_items
               SET content = COALESCE($2, content),
                   is_completed = COALESCE($3, is_completed)
               WHERE id = $1
               RETURNING id, card_id, content, is_completed, position, created_at"#,
        )
        .bind(id)
        .bind(&data.content)
        .bind(data.is_completed)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound {
            entity: "checklist item",
            id,
        })
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ordering::remove::<ChecklistItem, _>(&mut *tx, id)
            .await?
            .ok_or(RepositoryError::NotFound {
                entity: "checklist item",
                id,
            })?;
        tx.commit().await?;
        Ok(())
    }

    async fn move_item(
        &self,
        id: i64,
        card_id: i64,
        position: i32,
    ) -> Result<ChecklistItem, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ordering::relocate::<ChecklistItem, _>(&mut *tx, id, card_id, position).await?;
        let item = sqlx::query_as::<_, ChecklistItem>(
            r#"SELECT id, card_id, content, is_completed, position, created_at
               FROM checklist_items
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn reorder(&self, card_id: i64, item_ids: &[i64]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ordering::reorder::<ChecklistItem, _>(&mut *tx, card_id, item_ids).await?;
        tx.commit().await?;
        Ok(())
    }
}
