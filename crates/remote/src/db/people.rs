use async_trait::async_trait;
use db::models::{
    RepositoryError,
    person::{CreatePerson, Person, PersonRepository},
};
use sqlx::PgPool;

/// People of an external board.
///
/// The `people` table of a board database has no board column: every row
/// belongs to the board the database was provisioned for, and `board_id` is
/// filled in from the repository.
#[derive(Clone)]
pub struct PgPersonRepository {
    pool: PgPool,
    board_id: i64,
}

impl PgPersonRepository {
    pub fn new(pool: PgPool, board_id: i64) -> Self {
        Self { pool, board_id }
    }
}

#[async_trait]
impl PersonRepository for PgPersonRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Person>, RepositoryError> {
        let person = sqlx::query_as::<_, Person>(
            r#"SELECT id, $2::BIGINT AS board_id, name, created_at
               FROM people
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(self.board_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(person)
    }

    async fn find_by_board(&self, board_id: i64) -> Result<Vec<Person>, RepositoryError> {
        if board_id != self.board_id {
            return Ok(Vec::new());
        }
        let people = sqlx::query_as::<_, Person>(
            r#"SELECT id, $1::BIGINT AS board_id, name, created_at
               FROM people
               ORDER BY name, id"#,
        )
        .bind(self.board_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(people)
    }

    async fn create(&self, data: &CreatePerson) -> Result<Person, RepositoryError> {
        let person = sqlx::query_as::<_, Person>(
            r#"INSERT INTO people (name)
               VALUES ($1)
               RETURNING id, $2::BIGINT AS board_id, name, created_at"#,
        )
        .bind(&data.name)
        .bind(self.board_id)
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
            r#"SELECT p.id, $2::BIGINT AS board_id, p.name, p.created_at
               FROM people p
               JOIN card_assignees ca ON ca.person_id = p.id
               WHERE ca.card_id = $1
               ORDER BY p.name, p.id"#,
        )
        .bind(card_id)
        .bind(self.board_id)
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

        sqlx::query(
            r#"INSERT INTO card_assignees (card_id, person_id)
               SELECT $1, person_id FROM UNNEST($2::BIGINT[]) AS t(person_id)
               ON CONFLICT DO NOTHING"#,
        )
        .bind(card_id)
        .bind(person_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
