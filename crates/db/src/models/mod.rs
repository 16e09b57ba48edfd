//! Board content and registry models.
//!
//! [`board`] and [`connection`] live only in the local database. The entity
//! modules each define a repository trait with a local (SQLite) variant here;
//! the external (Postgres) variants live in the `remote` crate. Callers pick a
//! variant once when a board is bound and only see the trait afterwards.

use thiserror::Error;

pub mod board;
pub mod card;
pub mod checklist_item;
pub mod column;
pub mod comment;
pub mod connection;
pub mod person;

/// Error returned by every entity repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}
