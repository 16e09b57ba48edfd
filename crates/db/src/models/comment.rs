use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::RepositoryError;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub card_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateComment {
    pub card_id: i64,
    pub content: String,
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, RepositoryError>;

    /// Comments on a card, newest first.
    async fn find_by_card(&self, card_id: i64) -> Result<Vec<Comment>, RepositoryError>;

    async fn create(&self, data: &CreateComment) -> Result<Comment, RepositoryError>;

    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;
}

#[derive(Clone)]
pub struct LocalCommentRepository {
    pool: SqlitePool,
}

impl LocalCommentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for LocalCommentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, RepositoryError> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, card_id, content, created_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn find_by_card(&self, card_id: i64) -> Result<Vec<Comment>, RepositoryError> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"SELECT id, card_id, content, created_at
               FROM comments
               WHERE card_id = $1
               ORDER BY created_at DESC, id DESC"#,
        )
        .bind(card_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn create(&self, data: &CreateComment) -> Result<Comment, RepositoryError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"INSERT INTO comments (card_id, content)
               VALUES ($1, $2)
               RETURNING id, card_id, content, created_at"#,
        )
        .bind(data.card_id)
        .bind(&data.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: "comment",
                id,
            });
        }
        Ok(())
    }
}
