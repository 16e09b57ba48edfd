//! Board registry.
//!
//! Every board has a record in the local database, whatever its backend. For
//! external boards the record carries the connection and database name used
//! to reach the board's own Postgres database; for local boards the content
//! lives next to the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};

use crate::validation::{ValidationError, validate_database_name, validate_not_empty};

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default,
)]
#[sqlx(type_name = "backend_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub backend: BackendKind,
    pub connection_id: Option<i64>,
    pub database_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Board {
    /// The external connection id and database name, if this board has them.
    pub fn external_target(&self) -> Option<(i64, &str)> {
        match (self.backend, self.connection_id, self.database_name.as_deref()) {
            (BackendKind::External, Some(connection_id), Some(database)) => {
                Some((connection_id, database))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBoard {
    pub name: String,
    #[serde(default)]
    pub backend: BackendKind,
    pub connection_id: Option<i64>,
    pub database_name: Option<String>,
}

impl CreateBoard {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: BackendKind::Local,
            connection_id: None,
            database_name: None,
        }
    }

    pub fn external(
        name: impl Into<String>,
        connection_id: i64,
        database_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            backend: BackendKind::External,
            connection_id: Some(connection_id),
            database_name: Some(database_name.into()),
        }
    }

    /// Check the backend descriptor before anything is persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_not_empty("Board name", &self.name)?;
        match self.backend {
            BackendKind::Local => {
                if self.connection_id.is_some() || self.database_name.is_some() {
                    return Err(ValidationError::UnexpectedExternalSettings);
                }
            }
            BackendKind::External => {
                let (Some(_), Some(database)) = (self.connection_id, &self.database_name) else {
                    return Err(ValidationError::MissingConnection);
                };
                validate_database_name(database)?;
            }
        }
        Ok(())
    }
}

impl Board {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(
            r#"SELECT id, name, backend, connection_id, database_name, created_at
               FROM boards
               ORDER BY id"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(
            r#"SELECT id, name, backend, connection_id, database_name, created_at
               FROM boards
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// The board shown when none is selected: the oldest one.
    pub async fn find_default(pool: &SqlitePool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(
            r#"SELECT id, name, backend, connection_id, database_name, created_at
               FROM boards
               ORDER BY id
               LIMIT 1"#,
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_connection(
        pool: &SqlitePool,
        connection_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(
            r#"SELECT id, name, backend, connection_id, database_name, created_at
               FROM boards
               WHERE connection_id = $1
               ORDER BY id"#,
        )
        .bind(connection_id)
        .fetch_all(pool)
        .await
    }

    pub async fn exists_for_connection(
        pool: &SqlitePool,
        connection_id: i64,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM boards WHERE connection_id = $1)",
        )
        .bind(connection_id)
        .fetch_one(pool)
        .await
    }

    /// Insert a board record. Callers validate `data` first.
    pub async fn create(pool: &SqlitePool, data: &CreateBoard) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Board>(
            r#"INSERT INTO boards (name, backend, connection_id, database_name)
               VALUES ($1, $2, $3, $4)
               RETURNING id, name, backend, connection_id, database_name, created_at"#,
        )
        .bind(&data.name)
        .bind(data.backend)
        .bind(data.connection_id)
        .bind(&data.database_name)
        .fetch_one(pool)
        .await
    }

    pub async fn update_name(
        pool: &SqlitePool,
        id: i64,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(
            r#"UPDATE boards
               SET name = $2
               WHERE id = $1
               RETURNING id, name, backend, connection_id, database_name, created_at"#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Delete a board record, cascading to its local content.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn backend_kind_round_trips_through_strings() {
        assert_eq!(BackendKind::from_str("external").unwrap(), BackendKind::External);
        assert_eq!(BackendKind::Local.to_string(), "local");
    }

    #[test]
    fn local_boards_reject_external_settings() {
        let mut data = CreateBoard::local("Roadmap");
        assert!(data.validate().is_ok());

        data.database_name = Some("roadmap".to_string());
        assert_eq!(
            data.validate(),
            Err(ValidationError::UnexpectedExternalSettings)
        );
    }

    #[test]
    fn external_boards_need_connection_and_valid_name() {
        assert!(CreateBoard::external("Roadmap", 1, "roadmap").validate().is_ok());

        let mut missing = CreateBoard::external("Roadmap", 1, "roadmap");
        missing.connection_id = None;
        assert_eq!(missing.validate(), Err(ValidationError::MissingConnection));

        assert_eq!(
            CreateBoard::external("Roadmap", 1, "1bad;name").validate(),
            Err(ValidationError::InvalidDatabaseName("1bad;name".to_string()))
        );
    }

    #[test]
    fn blank_board_names_are_rejected() {
        assert_eq!(
            CreateBoard::local("  ").validate(),
            Err(ValidationError::EmptyName("Board name"))
        );
    }
}
