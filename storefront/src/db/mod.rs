// storefront/src/db/mod.rs

//! Postgres implementations of the core storage contracts.

pub mod carts;
pub mod orders;
pub mod settlements;

pub use carts::{PgDeviceCarts, PgRemoteCarts};
pub use orders::PgOrderStore;
pub use settlements::{PgSettlements, SettlementRecorder};

use crate::errors::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use storefront_core::StoreError;
use tracing::info;

/// Connects to Postgres and, when asked, applies the embedded migrations.
pub async fn init_pool(database_url: &str, run_migrations: bool) -> Result<PgPool> {
  let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
  info!("Successfully connected to the database.");
  if run_migrations {
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully.");
  }
  Ok(pool)
}

pub(crate) fn storage_error(err: sqlx::Error) -> StoreError {
  StoreError::Storage(anyhow::Error::new(err))
}
