//! Database connection pool (§9: one `PgPool` per process, shared by every component).
//! Grounded on the teacher's `db::Database` handle and `db/timescale.rs`'s pool-holding
//! style; the eMAG sync core has no time-series data so there is no `timescale` module here.

use sqlx::postgres::{PgPoolOptions, PgPool};

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Applies pending migrations from `migrations/`. Not an Alembic-style framework —
    /// just the minimum needed to stand up the schema (§12 non-goal clarification).
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}
