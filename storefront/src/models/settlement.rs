// storefront/src/models/settlement.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SettlementRow {
  pub order_id: String,
  pub reference: String,
  pub amount: i64,
  pub recorded_at: DateTime<Utc>,
}
