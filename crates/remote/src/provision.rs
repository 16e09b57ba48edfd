//! Provisioning of per-board Postgres databases.
//!
//! A board database is created on first use through an administrative
//! connection to the server's maintenance database, then opened as a pool and
//! migrated. Nothing here retries; every failure goes back to the caller.

use db::{
    models::connection::ConnectionCredentials,
    validation::{ValidationError, validate_database_name},
};
use sqlx::{
    Connection, Executor, PgConnection, PgPool, migrate::MigrateError,
    postgres::PgConnectOptions,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{connect_options, create_pool, get_connect_timeout, migrate};

/// Database every Postgres server has, used for administrative statements.
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// SQLSTATE `duplicate_database`.
const DUPLICATE_DATABASE: &str = "42P04";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to connect to {host}:{port}: {source}")]
    Connectivity {
        host: String,
        port: u16,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to create database {name}: {source}")]
    CreateDatabase {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to migrate database {name}: {source}")]
    Migration {
        name: String,
        #[source]
        source: MigrateError,
    },
}

impl ProvisionError {
    fn connectivity(creds: &ConnectionCredentials, source: sqlx::Error) -> Self {
        ProvisionError::Connectivity {
            host: creds.host.clone(),
            port: creds.port,
            source,
        }
    }
}

async fn connect_single(options: &PgConnectOptions) -> Result<PgConnection, sqlx::Error> {
    match tokio::time::timeout(get_connect_timeout(), PgConnection::connect_with(options)).await {
        Ok(result) => result,
        Err(_) => Err(sqlx::Error::Io(std::io::ErrorKind::TimedOut.into())),
    }
}

/// Open a transient connection to the maintenance database and ping it.
pub async fn ping(creds: &ConnectionCredentials) -> Result<(), ProvisionError> {
    let options = connect_options(creds, MAINTENANCE_DATABASE);
    let mut conn = connect_single(&options)
        .await
        .map_err(|e| ProvisionError::connectivity(creds, e))?;
    let result = conn.ping().await;
    if let Err(e) = conn.close().await {
        debug!(error = %e, "Failed to close liveness connection");
    }
    result.map_err(|e| ProvisionError::connectivity(creds, e))
}

/// Create database `name` if it does not exist yet.
///
/// Returns whether the database was created by this call.
pub async fn ensure_database(
    creds: &ConnectionCredentials,
    name: &str,
) -> Result<bool, ProvisionError> {
    // The name is spliced into DDL below; it must pass the allow-list here,
    // whatever the caller checked.
    validate_database_name(name)?;

    let options = connect_options(creds, MAINTENANCE_DATABASE);
    let mut admin = connect_single(&options)
        .await
        .map_err(|e| ProvisionError::connectivity(creds, e))?;

    let result = create_if_missing(&mut admin, name).await;

    if let Err(e) = admin.close().await {
        debug!(error = %e, "Failed to close administrative connection");
    }
    result
}

async fn create_if_missing(admin: &mut PgConnection, name: &str) -> Result<bool, ProvisionError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&mut *admin)
            .await
            .map_err(|source| ProvisionError::CreateDatabase {
                name: name.to_string(),
                source,
            })?;

    if exists {
        debug!(database = %name, "Board database already exists");
        return Ok(false);
    }

    // Simple query protocol: CREATE DATABASE cannot run in a transaction block.
    let statement = format!("CREATE DATABASE \"{name}\"");
    match admin.execute(statement.as_str()).await {
        Ok(_) => {
            info!(database = %name, "Created board database");
            Ok(true)
        }
        Err(e)
            if e.as_database_error()
                .and_then(|d| d.code())
                .is_some_and(|code| code == DUPLICATE_DATABASE) =>
        {
            debug!(database = %name, "Board database was created concurrently");
            Ok(false)
        }
        Err(source) => Err(ProvisionError::CreateDatabase {
            name: name.to_string(),
            source,
        }),
    }
}

/// Open a pool on database `name` and apply the board schema.
///
/// On migration failure the pool is closed and the database is left as it is.
pub async fn open_board_database(
    creds: &ConnectionCredentials,
    name: &str,
) -> Result<PgPool, ProvisionError> {
    let pool = create_pool(connect_options(creds, name))
        .await
        .map_err(|e| ProvisionError::connectivity(creds, e))?;

    if let Err(source) = migrate(&pool).await {
        warn!(database = %name, error = %source, "Board database migration failed");
        pool.close().await;
        return Err(ProvisionError::Migration {
            name: name.to_string(),
            source,
        });
    }

    info!(database = %name, "Board database ready");
    Ok(pool)
}

/// Ensure database `name` exists, then open and migrate it.
pub async fn provision(creds: &ConnectionCredentials, name: &str) -> Result<PgPool, ProvisionError> {
    ensure_database(creds, name).await?;
    open_board_database(creds, name).await
}

#[cfg(test)]
mod tests {
    use db::models::connection::SslMode;
    use secrecy::SecretString;

    use super::*;

    fn unreachable_server() -> ConnectionCredentials {
        ConnectionCredentials {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "nobody".to_string(),
            password: SecretString::from(String::new()),
            ssl_mode: SslMode::Disable,
        }
    }

    #[tokio::test]
    async fn invalid_name_is_rejected_before_connecting() {
        let err = ensure_database(&unreachable_server(), "1bad;name")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Validation(ValidationError::InvalidDatabaseName(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connectivity_failure() {
        let err = ping(&unreachable_server()).await.unwrap_err();
        match err {
            ProvisionError::Connectivity { host, port, .. } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
