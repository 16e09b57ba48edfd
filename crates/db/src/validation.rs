//! Validation of board backend settings.
//!
//! External database names end up inside a `CREATE DATABASE` statement, where
//! identifiers cannot be bound as parameters, so they are checked against a
//! strict allow-list before anything touches the network.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Letters, digits and underscore; must not start with a digit; at most 63
/// characters (the Postgres identifier limit).
static DATABASE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("database name pattern compiles")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "Invalid database name: '{0}'. Use letters, digits and underscores, \
         not starting with a digit, at most 63 characters"
    )]
    InvalidDatabaseName(String),

    #[error("External boards require a connection and a database name")]
    MissingConnection,

    #[error("Local boards cannot reference a connection or database name")]
    UnexpectedExternalSettings,

    #[error("Invalid port: {0}. Must be between 1 and 65535")]
    InvalidPort(i32),

    #[error("{0} must not be empty")]
    EmptyName(&'static str),
}

/// Validate an external database name.
///
/// # Examples
/// ```
/// use db::validation::validate_database_name;
///
/// assert!(validate_database_name("team_board_1").is_ok());
/// assert!(validate_database_name("1bad;name").is_err());
/// ```
pub fn validate_database_name(name: &str) -> Result<(), ValidationError> {
    if DATABASE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidDatabaseName(name.to_string()))
    }
}

pub fn validate_port(port: i32) -> Result<u16, ValidationError> {
    u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or(ValidationError::InvalidPort(port))
}

pub fn validate_not_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyName(field))
    } else {
        Ok(())
    }
}
