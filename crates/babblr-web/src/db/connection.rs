//! SQLite connection pool and embedded migrations.

use std::time::Duration;

use diesel::SqliteConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MEMORY_DATABASE: &str = ":memory:";

/// Pragmas applied to every pooled connection.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query("PRAGMA foreign_keys = ON")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        diesel::sql_query(format!(
            "PRAGMA busy_timeout = {}",
            self.busy_timeout.as_millis()
        ))
        .execute(conn)
        .map_err(diesel::r2d2::Error::QueryError)?;
        Ok(())
    }
}

/// Create a pool for `database_url` (a file path or `:memory:`).
///
/// Every `:memory:` connection is a separate database, so that URL gets a
/// single connection that is never recycled.
pub fn create_pool(database_url: &str) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let builder = Pool::builder().connection_customizer(Box::new(ConnectionOptions {
        busy_timeout: BUSY_TIMEOUT,
    }));
    let builder = if database_url == MEMORY_DATABASE {
        builder
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
    } else {
        builder.max_size(8)
    };
    builder.build(manager)
}

/// Apply pending migrations.
pub fn run_migrations(
    pool: &DbPool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    if !applied.is_empty() {
        info!("Applied {} database migration(s)", applied.len());
    }
    Ok(())
}
