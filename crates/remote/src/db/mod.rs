//! Postgres access for external boards.
//!
//! Each external board owns one database. The repositories here implement the
//! entity traits from `db::models` against that database; they are built with
//! the board id so rows that carry no board reference can be reported with it.

pub mod cards;
pub mod checklist_items;
pub mod columns;
pub mod comments;
pub mod people;

use std::time::Duration;

use db::models::connection::{ConnectionCredentials, SslMode};
use secrecy::ExposeSecret;
use sqlx::{
    PgPool,
    migrate::MigrateError,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};

pub use cards::PgCardRepository;
pub use checklist_items::PgChecklistRepository;
pub use columns::PgColumnRepository;
pub use comments::PgCommentRepository;
pub use people::PgPersonRepository;

/// Default number of connections in each board's pool.
/// Can be overridden via the `PLANK_PG_MAX_CONNECTIONS` environment variable.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum number of connections per board pool, from `PLANK_PG_MAX_CONNECTIONS`.
pub fn get_max_connections() -> u32 {
    std::env::var("PLANK_PG_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS)
}

/// How long to wait for a server before giving up, from
/// `PLANK_PG_CONNECT_TIMEOUT_SECS`.
pub fn get_connect_timeout() -> Duration {
    let secs = std::env::var("PLANK_PG_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

fn pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Allow => PgSslMode::Allow,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

/// Typed connect options for `database` on the server described by `creds`.
///
/// Nothing is formatted into a connection string, so credentials and names
/// cannot inject extra parameters.
pub fn connect_options(creds: &ConnectionCredentials, database: &str) -> PgConnectOptions {
    PgConnectOptions::new_without_pgpass()
        .host(&creds.host)
        .port(creds.port)
        .username(&creds.username)
        .password(creds.password.expose_secret())
        .database(database)
        .ssl_mode(pg_ssl_mode(creds.ssl_mode))
}

pub async fn create_pool(options: PgConnectOptions) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(get_max_connections())
        .acquire_timeout(get_connect_timeout())
        .connect_with(options)
        .await
}

pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
