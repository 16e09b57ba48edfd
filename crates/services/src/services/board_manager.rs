//! Board and connection management.
//!
//! [`BoardManager`] owns the board registry, the connection registry and the
//! [`ServiceCache`]. Every entity operation on a board goes through the
//! [`KanbanService`] returned by [`BoardManager::service_for_board`].

use std::sync::Arc;

use db::{
    DBService,
    models::{
        RepositoryError,
        board::{Board, CreateBoard},
        connection::{
            ConnectionCredentials, CreateConnection, PgConnection as ConnectionRecord,
            UpdateConnection,
        },
    },
    validation::{ValidationError, validate_not_empty, validate_port},
};
use remote::ProvisionError;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use super::{
    kanban::{BoardWithData, KanbanService},
    provisioner::{BackendProvisioner, PostgresProvisioner},
    service_cache::ServiceCache,
};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("board not found: {0}")]
    NotFound(i64),
    #[error("connection not found: {0}")]
    ConnectionNotFound(i64),
    #[error("connection {0} is still used by at least one board")]
    ConnectionInUse(i64),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub struct BoardManager {
    pool: SqlitePool,
    cache: ServiceCache,
    provisioner: Arc<dyn BackendProvisioner>,
}

impl BoardManager {
    pub fn new(db: &DBService) -> Self {
        Self::with_provisioner(db.pool.clone(), Arc::new(PostgresProvisioner))
    }

    pub fn with_provisioner(pool: SqlitePool, provisioner: Arc<dyn BackendProvisioner>) -> Self {
        Self {
            cache: ServiceCache::new(pool.clone(), provisioner.clone()),
            pool,
            provisioner,
        }
    }

    pub fn cache(&self) -> &ServiceCache {
        &self.cache
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>, BoardError> {
        Ok(Board::find_all(&self.pool).await?)
    }

    pub async fn get_board(&self, id: i64) -> Result<Board, BoardError> {
        Board::find_by_id(&self.pool, id)
            .await?
            .ok_or(BoardError::NotFound(id))
    }

    /// The board with the lowest id, if any exist.
    pub async fn default_board(&self) -> Result<Option<Board>, BoardError> {
        Ok(Board::find_default(&self.pool).await?)
    }

    pub async fn service_for_board(&self, id: i64) -> Result<Arc<KanbanService>, BoardError> {
        self.cache.get_or_create(id).await
    }

    pub async fn board_with_data(&self, id: i64) -> Result<BoardWithData, BoardError> {
        let board = self.get_board(id).await?;
        let service = self.service_for_board(id).await?;
        Ok(service.board_with_data(board).await?)
    }

    /// Persist a board, bind its backend and seed the default columns.
    ///
    /// External boards are provisioned here, so an unreachable server or a
    /// failed migration is reported to the caller. Any failure after the
    /// record is written deletes it again.
    pub async fn create_board(&self, data: &CreateBoard) -> Result<Board, BoardError> {
        data.validate()?;
        if let Some(connection_id) = data.connection_id
            && ConnectionRecord::find_by_id(&self.pool, connection_id)
                .await?
                .is_none()
        {
            return Err(BoardError::ConnectionNotFound(connection_id));
        }

        let board = Board::create(&self.pool, data).await?;

        let seeded = match self.cache.get_or_create(board.id).await {
            Ok(service) => service
                .create_default_columns()
                .await
                .map_err(BoardError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = seeded {
            warn!(board_id = board.id, error = %e, "board setup failed, removing record");
            self.cache.teardown(board.id).await;
            if let Err(delete_err) = Board::delete(&self.pool, board.id).await {
                warn!(
                    board_id = board.id,
                    error = %delete_err,
                    "failed to remove board record after setup failure"
                );
            }
            return Err(e);
        }

        info!(board_id = board.id, backend = %board.backend, "Created board");
        Ok(board)
    }

    pub async fn rename_board(&self, id: i64, name: &str) -> Result<Board, BoardError> {
        validate_not_empty("Board name", name)?;
        Board::update_name(&self.pool, id, name)
            .await?
            .ok_or(BoardError::NotFound(id))
    }

    /// Close the board's backend, then remove its record.
    ///
    /// External databases are left on their server.
    pub async fn delete_board(&self, id: i64) -> Result<(), BoardError> {
        let board = self.get_board(id).await?;
        self.cache.teardown(board.id).await;
        if Board::delete(&self.pool, board.id).await? == 0 {
            return Err(BoardError::NotFound(id));
        }
        info!(board_id = id, "Deleted board");
        Ok(())
    }

    pub async fn invalidate(&self, id: i64) {
        self.cache.invalidate(id).await;
    }

    pub async fn close_all(&self) {
        self.cache.close_all().await;
    }

    pub async fn test_connection(&self, creds: &ConnectionCredentials) -> Result<(), BoardError> {
        Ok(self.provisioner.check_liveness(creds).await?)
    }

    pub async fn has_boards_using_connection(&self, connection_id: i64) -> Result<bool, BoardError> {
        Ok(Board::exists_for_connection(&self.pool, connection_id).await?)
    }

    pub async fn list_connections(&self) -> Result<Vec<ConnectionRecord>, BoardError> {
        Ok(ConnectionRecord::find_all(&self.pool).await?)
    }

    pub async fn get_connection(&self, id: i64) -> Result<ConnectionRecord, BoardError> {
        ConnectionRecord::find_by_id(&self.pool, id)
            .await?
            .ok_or(BoardError::ConnectionNotFound(id))
    }

    /// Save a connection once the server has accepted a test connection.
    pub async fn create_connection(
        &self,
        data: &CreateConnection,
    ) -> Result<ConnectionRecord, BoardError> {
        data.validate()?;
        self.test_connection(&data.credentials()?).await?;
        let record = ConnectionRecord::create(&self.pool, data).await?;
        info!(connection_id = record.id, host = %record.host, "Saved connection");
        Ok(record)
    }

    /// Update a connection and drop the bindings of every board using it, so
    /// their next access reconnects with the new settings.
    pub async fn update_connection(
        &self,
        id: i64,
        data: &UpdateConnection,
    ) -> Result<ConnectionRecord, BoardError> {
        if let Some(name) = &data.name {
            validate_not_empty("Connection name", name)?;
        }
        if let Some(host) = &data.host {
            validate_not_empty("Host", host)?;
        }
        if let Some(username) = &data.username {
            validate_not_empty("Username", username)?;
        }
        if let Some(port) = data.port {
            validate_port(port)?;
        }

        let record = ConnectionRecord::update(&self.pool, id, data)
            .await?
            .ok_or(BoardError::ConnectionNotFound(id))?;

        for board in Board::find_by_connection(&self.pool, id).await? {
            self.cache.teardown(board.id).await;
        }
        Ok(record)
    }

    pub async fn delete_connection(&self, id: i64) -> Result<(), BoardError> {
        if self.has_boards_using_connection(id).await? {
            return Err(BoardError::ConnectionInUse(id));
        }
        if ConnectionRecord::delete(&self.pool, id).await? == 0 {
            return Err(BoardError::ConnectionNotFound(id));
        }
        Ok(())
    }
}
