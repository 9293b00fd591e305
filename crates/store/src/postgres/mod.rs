//! PostgreSQL stores over one shared `sqlx` pool.

mod carts;
mod catalog;
mod orders;

pub use carts::PostgresCartStore;
pub use catalog::PostgresCatalog;
pub use orders::PostgresOrderStore;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::Result;

/// Opens a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

/// Converts a stored BIGINT count back into the `u32` the domain uses.
fn to_u32(column: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| crate::StoreError::Corrupt(format!("{column} out of range: {value}")))
}
