use std::{collections::HashMap, sync::Arc};

use db::{
    models::{
        board::{BackendKind, Board},
        connection::PgConnection as ConnectionRecord,
    },
    validation::{ValidationError, validate_database_name},
};
use sqlx::{PgPool, SqlitePool};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{board_manager::BoardError, kanban::KanbanService, provisioner::BackendProvisioner};

struct Binding {
    service: Arc<KanbanService>,
    /// The board's own pool. `None` for boards in the local database.
    external: Option<PgPool>,
}

/// Per-board operation sets, built on first access.
///
/// The whole map sits behind one lock. A miss holds the write lock while the
/// backend is provisioned, so concurrent first accesses to a board share a
/// single provisioning attempt.
pub struct ServiceCache {
    local_pool: SqlitePool,
    provisioner: Arc<dyn BackendProvisioner>,
    bindings: RwLock<HashMap<i64, Binding>>,
}

impl ServiceCache {
    pub fn new(local_pool: SqlitePool, provisioner: Arc<dyn BackendProvisioner>) -> Self {
        Self {
            local_pool,
            provisioner,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, board_id: i64) -> Result<Arc<KanbanService>, BoardError> {
        {
            let bindings = self.bindings.read().await;
            if let Some(binding) = bindings.get(&board_id) {
                debug!(board_id, "Service cache hit");
                return Ok(binding.service.clone());
            }
        }

        let mut bindings = self.bindings.write().await;
        if let Some(binding) = bindings.get(&board_id) {
            debug!(board_id, "Service cache filled while waiting");
            return Ok(binding.service.clone());
        }

        debug!(board_id, "Service cache miss");
        let binding = self.bind(board_id).await?;
        let service = binding.service.clone();
        bindings.insert(board_id, binding);
        Ok(service)
    }

    async fn bind(&self, board_id: i64) -> Result<Binding, BoardError> {
        let board = Board::find_by_id(&self.local_pool, board_id)
            .await?
            .ok_or(BoardError::NotFound(board_id))?;

        match board.backend {
            BackendKind::Local => Ok(Binding {
                service: Arc::new(KanbanService::local(board_id, self.local_pool.clone())),
                external: None,
            }),
            BackendKind::External => {
                let (connection_id, database) = board
                    .external_target()
                    .ok_or(ValidationError::MissingConnection)?;
                validate_database_name(database)?;

                let record = ConnectionRecord::find_by_id(&self.local_pool, connection_id)
                    .await?
                    .ok_or(BoardError::ConnectionNotFound(connection_id))?;
                let creds = record.credentials()?;

                let pool = self.provisioner.provision(&creds, database).await?;
                info!(board_id, database = %database, "Bound board to external database");

                Ok(Binding {
                    service: Arc::new(KanbanService::external(board_id, pool.clone())),
                    external: Some(pool),
                })
            }
        }
    }

    /// Forget a binding. Its pool stays open until the last handle drops.
    pub async fn invalidate(&self, board_id: i64) {
        if self.bindings.write().await.remove(&board_id).is_some() {
            debug!(board_id, "Invalidated service binding");
        }
    }

    /// Forget a binding and close its external pool.
    pub async fn teardown(&self, board_id: i64) {
        let removed = self.bindings.write().await.remove(&board_id);
        if let Some(Binding {
            external: Some(pool),
            ..
        }) = removed
        {
            pool.close().await;
            info!(board_id, "Closed external board pool");
        }
    }

    pub async fn close_all(&self) {
        let drained: Vec<(i64, Binding)> = self.bindings.write().await.drain().collect();
        for (board_id, binding) in drained {
            if let Some(pool) = binding.external {
                pool.close().await;
                debug!(board_id, "Closed external board pool");
            }
        }
    }

    pub async fn is_bound(&self, board_id: i64) -> bool {
        self.bindings.read().await.contains_key(&board_id)
    }
}
