use async_trait::async_trait;
use db::models::connection::ConnectionCredentials;
use remote::provision::{self, ProvisionError};
use sqlx::PgPool;

/// Turns an external board's backend descriptor into a ready pool.
#[async_trait]
pub trait BackendProvisioner: Send + Sync {
    /// Create `database` if missing, open it and apply the board schema.
    async fn provision(
        &self,
        creds: &ConnectionCredentials,
        database: &str,
    ) -> Result<PgPool, ProvisionError>;

    /// Check that the server accepts a connection. Never mutates anything.
    async fn check_liveness(&self, creds: &ConnectionCredentials) -> Result<(), ProvisionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresProvisioner;

#[async_trait]
impl BackendProvisioner for PostgresProvisioner {
    async fn provision(
        &self,
        creds: &ConnectionCredentials,
        database: &str,
    ) -> Result<PgPool, ProvisionError> {
        provision::provision(creds, database).await
    }

    async fn check_liveness(&self, creds: &ConnectionCredentials) -> Result<(), ProvisionError> {
        provision::ping(creds).await
    }
}
