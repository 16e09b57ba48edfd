use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::RepositoryError;

/// Someone who can be assigned to cards of a board.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePerson {
    pub board_id: i64,
    pub name: String,
}

#[async_trait]
pub trait PersonRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Person>, RepositoryError>;

    /// People of a board ordered by name.
    async fn find_by_board(&self, board_id: i64) -> Result<Vec<Person>, RepositoryError>;

    async fn create(&self, data: &CreatePerson) -> Result<Person, RepositoryError>;

    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;

    /// Assignees of a card ordered by name.
    async fn find_by_card(&self, card_id: i64) -> Result<Vec<Person>, RepositoryError>;

    /// Replace the assignees of a card.
    async fn set_card_assignees(
        &self,
        card_id: i64,
        person_ids: &[i64],
    ) -> Result<(), RepositoryError>;
}

#[derive(Clone)]
pub struct LocalPersonRepository {
    pool: SqlitePool,
}

impl LocalPersonRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonRepository for LocalPersonRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Person>, RepositoryError> {
        let person = sqlx::query_as::<_, Person>(
            "SELECT id, board_id, name, created_at FROM people WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(person)
    }

    async fn find_by_board(&self, board_id: i64) -> Result<Vec<Person>, RepositoryError> {
        let people = sqlx::query_as::<_, Person>(
            r#"SELECT id, board_id, name, created_at
               FROM people
               WHERE board_id = $1
               ORDER BY name, id"#,
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(people)
    }

    async fn create(&self, data: &CreatePerson) -> Result<Person, RepositoryError> {
        let person = sqlx::query_as::<_, Person>(
            r#"INSERT INTO people (board_id, name)
               VALUES ($1, $2)
               RETURNING id, board_id, name, created_at"#,
        )
        .bind(data.board_id)
        .bind(&data.name)
        .fetch_one(&self.pool)
        .await?;
        Ok(person)
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM people WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "person", id });
        }
        Ok(())
    }

    async fn find_by_card(&self, card_id: i64) -> Result<Vec<Person>, RepositoryError> {
        let people = sqlx::query_as::<_, Person>(
            r#"SELECT p.id, p.board_id, p.name, p.created_at
               FROM people p
               JOIN card_assignees ca ON ca.person_id = p.id
               WHERE ca.card_id = $1
               ORDER BY p.name, p.id"#,
        )
        .bind(card_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(people)
    }

    async fn set_card_assignees(
        &self,
        card_id: i64,
        person_ids: &[i64],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM card_assignees WHERE card_id = $1")
            .bind(card_id)
            .execute(&mut *tx)
            .await?;

        for person_id in person_ids {
            sqlx::query(
                "INSERT INTO card_assignees (card_id, person_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(card_id)
            .bind(person_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
