//! Registry of external Postgres servers that boards can be provisioned on.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};

use crate::validation::{ValidationError, validate_not_empty, validate_port};

pub const DEFAULT_PORT: i32 = 5432;

/// TLS negotiation mode, spelled the way libpq spells it.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default,
)]
#[sqlx(type_name = "ssl_mode", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SslMode {
    #[default]
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

#[derive(Clone, FromRow, Serialize, Deserialize)]
pub struct PgConnection {
    pub id: i64,
    pub name: String,
    pub host: String,
    pub port: i32,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub ssl_mode: SslMode,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Everything needed to open a connection to a server, with the password
/// kept behind [`SecretString`].
#[derive(Debug, Clone)]
pub struct ConnectionCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub ssl_mode: SslMode,
}

impl PgConnection {
    pub fn credentials(&self) -> Result<ConnectionCredentials, ValidationError> {
        Ok(ConnectionCredentials {
            host: self.host.clone(),
            port: validate_port(self.port)?,
            username: self.username.clone(),
            password: SecretString::from(self.password.clone()),
            ssl_mode: self.ssl_mode,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConnection {
    pub name: String,
    pub host: String,
    pub port: Option<i32>,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub ssl_mode: Option<SslMode>,
}

impl CreateConnection {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_not_empty("Connection name", &self.name)?;
        validate_not_empty("Host", &self.host)?;
        validate_not_empty("Username", &self.username)?;
        validate_port(self.port.unwrap_or(DEFAULT_PORT))?;
        Ok(())
    }

    /// Credentials with defaults applied, for testing before saving.
    pub fn credentials(&self) -> Result<ConnectionCredentials, ValidationError> {
        Ok(ConnectionCredentials {
            host: self.host.clone(),
            port: validate_port(self.port.unwrap_or(DEFAULT_PORT))?,
            username: self.username.clone(),
            password: SecretString::from(self.password.clone()),
            ssl_mode: self.ssl_mode.unwrap_or_default(),
        })
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateConnection {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: Option<SslMode>,
}

impl PgConnection {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PgConnection>(
            r#"SELECT id, name, host, port, username, password, ssl_mode, created_at
               FROM pg_connections
               ORDER BY name, id"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PgConnection>(
            r#"SELECT id, name, host, port, username, password, ssl_mode, created_at
               FROM pg_connections
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateConnection) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PgConnection>(
            r#"INSERT INTO pg_connections (name, host, port, username, password, ssl_mode)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, name, host, port, username, password, ssl_mode, created_at"#,
        )
        .bind(&data.name)
        .bind(&data.host)
        .bind(data.port.unwrap_or(DEFAULT_PORT))
        .bind(&data.username)
        .bind(&data.password)
        .bind(data.ssl_mode.unwrap_or_default())
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        data: &UpdateConnection,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let name = data.name.as_ref().unwrap_or(&existing.name);
        let host = data.host.as_ref().unwrap_or(&existing.host);
        let port = data.port.unwrap_or(existing.port);
        let username = data.username.as_ref().unwrap_or(&existing.username);
        let password = data.password.as_ref().unwrap_or(&existing.password);
        let ssl_mode = data.ssl_mode.unwrap_or(existing.ssl_mode);

        sqlx::query_as::<_, PgConnection>(
            r#"UPDATE pg_connections
               SET name = $2, host = $3, port = $4, username = $5, password = $6, ssl_mode = $7
               WHERE id = $1
               RETURNING id, name, host, port, username, password, ssl_mode, created_at"#,
        )
        .bind(id)
        .bind(name)
        .bind(host)
        .bind(port)
        .bind(username)
        .bind(password)
        .bind(ssl_mode)
        .fetch_optional(pool)
        .await
    }

    /// Fails with a foreign key error while a board still references the row.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pg_connections WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use secrecy::ExposeSecret;

    use super::*;

    fn sample() -> CreateConnection {
        CreateConnection {
            name: "Staging".to_string(),
            host: "db.internal".to_string(),
            port: None,
            username: "plank".to_string(),
            password: "hunter2".to_string(),
            ssl_mode: None,
        }
    }

    #[test]
    fn ssl_modes_use_libpq_spelling() {
        assert_eq!(SslMode::VerifyFull.to_string(), "verify-full");
        assert_eq!(SslMode::from_str("verify-ca").unwrap(), SslMode::VerifyCa);
        assert_eq!(SslMode::default(), SslMode::Disable);
    }

    #[test]
    fn create_credentials_apply_defaults() {
        let creds = sample().credentials().unwrap();
        assert_eq!(creds.port, 5432);
        assert_eq!(creds.ssl_mode, SslMode::Disable);
        assert_eq!(creds.password.expose_secret(), "hunter2");
    }

    #[test]
    fn create_validation_rejects_bad_input() {
        let mut data = sample();
        data.port = Some(0);
        assert_eq!(data.validate(), Err(ValidationError::InvalidPort(0)));

        let mut data = sample();
        data.host = String::new();
        assert_eq!(data.validate(), Err(ValidationError::EmptyName("Host")));
    }

    #[test]
    fn password_is_hidden_from_debug_and_json() {
        let conn = PgConnection {
            id: 1,
            name: "Staging".to_string(),
            host: "db.internal".to_string(),
            port: 5432,
            username: "plank".to_string(),
            password: "hunter2".to_string(),
            ssl_mode: SslMode::Require,
            created_at: Utc::now(),
        };

        assert!(!format!("{conn:?}").contains("hunter2"));
        let json = serde_json::to_string(&conn).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"ssl_mode\":\"require\""));
    }
}
