// storefront/src/db/orders.rs

use crate::models::OrderRow;
use anyhow::Error as AnyhowError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use storefront_core::ledger::OrderStore;
use storefront_core::order::{Finalization, NewOrder, Order, OrderLine, OrderStatus};
use storefront_core::LedgerError;
use tracing::instrument;

const ORDER_COLUMNS: &str = "order_id, user_id, total_amount, subtotal, gst_amount, status, payment_method, \
   transaction_id, items, notes, address, pincode, device, date, created_at, updated_at";

pub struct PgOrderStore {
  pool: PgPool,
  /// Names written to `payment_method` for card payments.
  card_gateways: Vec<String>,
}

impl PgOrderStore {
  pub fn new(pool: PgPool, card_gateways: Vec<String>) -> Self {
    Self { pool, card_gateways }
  }

  fn to_order(&self, row: OrderRow) -> Result<Order, LedgerError> {
    let gateways: Vec<&str> = self.card_gateways.iter().map(String::as_str).collect();
    row.into_order(&gateways)
  }
}

fn backend(err: sqlx::Error) -> LedgerError {
  LedgerError::Backend(AnyhowError::new(err))
}

#[async_trait]
impl OrderStore for PgOrderStore {
  async fn order_id_exists(&self, order_id: &str) -> Result<bool, LedgerError> {
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE order_id = $1)")
      .bind(order_id)
      .fetch_one(&self.pool)
      .await
      .map_err(backend)?;
    Ok(exists.0)
  }

  #[instrument(name = "PgOrderStore::insert_header", skip_all, fields(order_id = %order.order_id))]
  async fn insert_header(&self, order: &NewOrder) -> Result<Order, LedgerError> {
    let sql = format!(
      "INSERT INTO orders (order_id, user_id, total_amount, subtotal, gst_amount, status, payment_method, \
       transaction_id, items, notes, address, pincode, device, date) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
       RETURNING {}",
      ORDER_COLUMNS
    );
    let inserted = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(&order.order_id)
      .bind(order.user_id.as_ref().map(|u| u.as_str()))
      .bind(order.total.minor())
      .bind(order.subtotal.minor())
      .bind(order.tax.minor())
      .bind(order.status.as_str())
      .bind(order.payment_method.as_stored())
      .bind(order.payment_reference.as_deref())
      .bind(Json(&order.lines))
      .bind(order.details.notes.as_deref())
      .bind(order.details.address.as_deref())
      .bind(order.details.pincode.as_deref())
      .bind(order.details.device.as_deref())
      .bind(order.date)
      .fetch_one(&self.pool)
      .await;

    match inserted {
      Ok(row) => self.to_order(row),
      Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(LedgerError::DuplicateOrderId {
        order_id: order.order_id.clone(),
      }),
      Err(e) => Err(backend(e)),
    }
  }

  #[instrument(name = "PgOrderStore::insert_lines", skip_all, fields(order_id = %order_id, lines = lines.len()))]
  async fn insert_lines(&self, order_id: &str, lines: &[OrderLine]) -> Result<(), LedgerError> {
    let mut tx = self.pool.begin().await.map_err(backend)?;
    for line in lines {
      sqlx::query(
        "INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price, total_price) \
         VALUES ($1, $2, $3, $4, $5, $6)",
      )
      .bind(order_id)
      .bind(&line.product_id)
      .bind(&line.name)
      .bind(i32::try_from(line.quantity).unwrap_or(i32::MAX))
      .bind(line.unit_price.minor())
      .bind(line.line_total.minor())
      .execute(&mut *tx)
      .await
      .map_err(backend)?;
    }
    tx.commit().await.map_err(backend)
  }

  async fn delete_header(&self, order_id: &str) -> Result<(), LedgerError> {
    sqlx::query("DELETE FROM orders WHERE order_id = $1")
      .bind(order_id)
      .execute(&self.pool)
      .await
      .map_err(backend)?;
    Ok(())
  }

  async fn find(&self, order_id: &str) -> Result<Option<Order>, LedgerError> {
    let sql = format!("SELECT {} FROM orders WHERE order_id = $1", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(backend)?;
    row.map(|r| self.to_order(r)).transpose()
  }

  /// One conditional `UPDATE`: only an open order matches, so two concurrent
  /// callers cannot both move it.
  #[instrument(name = "PgOrderStore::transition_open", skip_all, fields(order_id = %order_id, status = %finalization.status))]
  async fn transition_open(
    &self,
    order_id: &str,
    finalization: &Finalization,
    at: DateTime<Utc>,
  ) -> Result<Option<Order>, LedgerError> {
    let sql = format!(
      "UPDATE orders SET status = $2, transaction_id = $3, updated_at = $4 \
       WHERE order_id = $1 AND status IN ($5, $6) \
       RETURNING {}",
      ORDER_COLUMNS
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(order_id)
      .bind(finalization.status.as_str())
      .bind(&finalization.payment_reference)
      .bind(at)
      .bind(OrderStatus::Pending.as_str())
      .bind(OrderStatus::PendingPayment.as_str())
      .fetch_optional(&self.pool)
      .await
      .map_err(backend)?;
    row.map(|r| self.to_order(r)).transpose()
  }
}
