//! Database layer
//!
//! SQLite is the default backend (a single file next to the binary); MySQL is
//! available for larger installations. Both sit behind [`DatabasePool`], and
//! repositories pick the concrete pool with [`with_pool!`].
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, InsertId, MysqlDatabase,
    SqliteDatabase,
};

/// Run `$body` against the concrete pool behind a [`DynDatabasePool`].
///
/// The body is expanded once per driver with `$pool` bound to a
/// `&SqlitePool` or a `&MySqlPool`, so it may only use sqlx calls that are
/// generic over the database. Placeholders are `?` on both backends.
macro_rules! with_pool {
    ($db:expr, |$pool:ident| $body:expr) => {{
        let db = &$db;
        match db.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $pool = ::anyhow::Context::context(db.as_sqlite(), "SQLite pool unavailable")?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $pool = ::anyhow::Context::context(db.as_mysql(), "MySQL pool unavailable")?;
                $body
            }
        }
    }};
}

pub(crate) use with_pool;

/// `INSERT` prefix that silently skips rows violating a unique key
pub(crate) fn insert_ignore(pool: &DynDatabasePool) -> &'static str {
    match pool.driver() {
        crate::config::DatabaseDriver::Sqlite => "INSERT OR IGNORE",
        crate::config::DatabaseDriver::Mysql => "INSERT IGNORE",
    }
}
