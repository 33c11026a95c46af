// storefront/src/db/settlements.rs

use super::storage_error;
use crate::models::SettlementRow;
use async_trait::async_trait;
use sqlx::PgPool;
use storefront_core::checkout::{MemorySettlements, Settlement, SettlementCheck};
use storefront_core::{Money, StoreError, StoreResult};
use tracing::{info, instrument};

/// Records a UPI settlement seen by an operator or a bank feed.
#[async_trait]
pub trait SettlementRecorder: Send + Sync {
  async fn record(&self, order_id: &str, reference: &str, amount: Money) -> StoreResult<()>;
}

#[async_trait]
impl SettlementRecorder for MemorySettlements {
  async fn record(&self, order_id: &str, reference: &str, amount: Money) -> StoreResult<()> {
    MemorySettlements::record(self, order_id, reference, amount);
    Ok(())
  }
}

/// `upi_settlements`, one row per order.
#[derive(Clone)]
pub struct PgSettlements {
  pool: PgPool,
}

impl PgSettlements {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl SettlementCheck for PgSettlements {
  async fn check(&self, order_id: &str, expected_amount: Money) -> StoreResult<Settlement> {
    let row = sqlx::query_as::<_, SettlementRow>(
      "SELECT order_id, reference, amount, recorded_at FROM upi_settlements WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(&self.pool)
    .await
    .map_err(storage_error)?;

    Ok(match row {
      None => Settlement::Unsettled,
      Some(row) if Money::from_minor(row.amount) != expected_amount => Settlement::Rejected {
        reason: format!(
          "settled {} but order total is {}",
          Money::from_minor(row.amount),
          expected_amount
        ),
      },
      Some(row) => Settlement::Settled { reference: row.reference },
    })
  }
}

#[async_trait]
impl SettlementRecorder for PgSettlements {
  /// A second record for the same order replaces the first.
  #[instrument(name = "PgSettlements::record", skip_all, fields(order_id = %order_id, amount = %amount))]
  async fn record(&self, order_id: &str, reference: &str, amount: Money) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO upi_settlements (order_id, reference, amount) VALUES ($1, $2, $3) \
       ON CONFLICT (order_id) DO UPDATE SET reference = EXCLUDED.reference, amount = EXCLUDED.amount, \
       recorded_at = now()",
    )
    .bind(order_id)
    .bind(reference)
    .bind(amount.minor())
    .execute(&self.pool)
    .await
    .map_err(|e| match e {
      sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
        StoreError::NotFound(format!("Order {} not found", order_id))
      }
      other => storage_error(other),
    })?;
    info!("UPI settlement recorded.");
    Ok(())
  }
}
