// storefront/src/models/order.rs

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use storefront_core::identity::UserId;
use storefront_core::order::{Order, OrderDetails, OrderLine, OrderStatus, PaymentMethod};
use storefront_core::{LedgerError, Money};

/// One row of `orders`. `items` is the line snapshot taken at creation.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
  pub order_id: String,
  pub user_id: Option<String>,
  pub total_amount: i64,
  pub subtotal: i64,
  pub gst_amount: i64,
  pub status: String,
  pub payment_method: String,
  pub transaction_id: Option<String>,
  pub items: Json<Vec<OrderLine>>,
  pub notes: Option<String>,
  pub address: Option<String>,
  pub pincode: Option<String>,
  pub device: Option<String>,
  pub date: NaiveDate,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl OrderRow {
  pub fn into_order(self, card_gateways: &[&str]) -> Result<Order, LedgerError> {
    let status = self
      .status
      .parse::<OrderStatus>()
      .map_err(|e| LedgerError::Backend(anyhow!("order {}: {}", self.order_id, e)))?;
    Ok(Order {
      payment_method: PaymentMethod::from_stored(&self.payment_method, card_gateways),
      user_id: self.user_id.map(UserId::new),
      lines: self.items.0,
      subtotal: Money::from_minor(self.subtotal),
      tax: Money::from_minor(self.gst_amount),
      total: Money::from_minor(self.total_amount),
      payment_reference: self.transaction_id,
      status,
      details: OrderDetails {
        notes: self.notes,
        address: self.address,
        pincode: self.pincode,
        device: self.device,
      },
      date: self.date,
      created_at: self.created_at,
      updated_at: self.updated_at,
      order_id: self.order_id,
    })
  }
}
