use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Per-connection pragmas applied whenever the pool opens a connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub enable_foreign_keys: bool,
    pub busy_timeout: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            enable_foreign_keys: true,
            busy_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        if self.enable_foreign_keys {
            conn.batch_execute("PRAGMA foreign_keys = ON;")
                .map_err(r2d2::Error::QueryError)?;
        }
        if let Some(timeout) = self.busy_timeout {
            conn.batch_execute(&format!("PRAGMA busy_timeout = {};", timeout.as_millis()))
                .map_err(r2d2::Error::QueryError)?;
        }

        Ok(())
    }
}

/// Builds a connection pool for the SQLite database at `database_url`.
///
/// # Example
/// ```no_run
/// let pool = refinery_blog::database::db_utils::establish_pool("blog.sqlite3", 8).unwrap();
/// ```
pub fn establish_pool(database_url: &str, max_size: u32) -> Result<DbPool, r2d2::PoolError> {
    log::debug!("opening pool of {max_size} connections to {database_url}");

    Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(ConnectionOptions::default()))
        .build(ConnectionManager::<SqliteConnection>::new(database_url))
}

/// Applies every embedded migration that has not run yet.
pub fn run_migrations(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    for version in applied {
        log::info!("applied migration {version}");
    }

    Ok(())
}

/// Fresh in-memory database with the schema loaded.
#[cfg(test)]
pub fn test_connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
    conn.batch_execute("PRAGMA foreign_keys = ON;")
        .expect("enable foreign keys");
    run_migrations(&mut conn).expect("migrations");
    conn
}

/// Single-connection pool over an in-memory database, so every checkout
/// sees the same data.
#[cfg(test)]
pub fn test_pool() -> DbPool {
    let pool = Pool::builder()
        .max_size(1)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout: None,
            ..ConnectionOptions::default()
        }))
        .build(ConnectionManager::<SqliteConnection>::new(":memory:"))
        .expect("in-memory pool");
    run_migrations(&mut pool.get().expect("connection")).expect("migrations");
    pool
}
