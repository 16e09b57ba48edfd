use anyhow::{Context, Error as AnyhowError};
use db::DBService;
use server::file_logging;
use services::services::board_manager::{BoardError, BoardManager};
use sqlx::Error as SqlxError;
use thiserror::Error;
use utils::assets::asset_dir;

#[derive(Debug, Error)]
pub enum PlankError {
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), PlankError> {
    // Load .env file if present (for development)
    dotenvy::dotenv().ok();

    // The guard flushes the log file on drop
    let log_level = std::env::var("PLANK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let _file_log_guard = file_logging::init_logging(&log_level);

    if !asset_dir().exists() {
        std::fs::create_dir_all(asset_dir())
            .with_context(|| format!("creating asset directory {}", asset_dir().display()))?;
    }

    let db = DBService::new().await?;
    let manager = BoardManager::new(&db);

    let boards = manager.list_boards().await?;
    let connections = manager.list_connections().await?;
    tracing::info!(
        boards = boards.len(),
        connections = connections.len(),
        "Board router ready"
    );
    if let Some(board) = manager.default_board().await? {
        tracing::info!(board_id = board.id, name = %board.name, "Default board");
    }

    shutdown_signal().await;

    perform_cleanup_actions(&manager, &db).await;
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

/// Close every external board pool, then checkpoint and close the local
/// database.
pub async fn perform_cleanup_actions(manager: &BoardManager, db: &DBService) {
    tracing::info!("Closing external board connections...");
    manager.close_all().await;

    match sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
        .execute(&db.pool)
        .await
    {
        Ok(_) => tracing::info!("Final WAL checkpoint completed"),
        Err(e) => tracing::warn!(error = %e, "Final WAL checkpoint failed"),
    }

    db.pool.close().await;
    tracing::info!("Local database closed");
}
