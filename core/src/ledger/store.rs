// storefront-core/src/ledger/store.rs

use crate::error::LedgerError;
use crate::order::{Finalization, NewOrder, Order, OrderLine};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable storage for orders.
///
/// Header and lines are separate writes so the ledger can compensate when the
/// second one fails.
#[async_trait]
pub trait OrderStore: Send + Sync {
  async fn order_id_exists(&self, order_id: &str) -> Result<bool, LedgerError>;

  /// Writes the order header. A taken `order_id` is `LedgerError::DuplicateOrderId`.
  async fn insert_header(&self, order: &NewOrder) -> Result<Order, LedgerError>;

  async fn insert_lines(&self, order_id: &str, lines: &[OrderLine]) -> Result<(), LedgerError>;

  /// Compensating delete for a header whose lines could not be written.
  async fn delete_header(&self, order_id: &str) -> Result<(), LedgerError>;

  async fn find(&self, order_id: &str) -> Result<Option<Order>, LedgerError>;

  /// Moves the order to `finalization` only if it is still open, as one atomic
  /// operation. `Ok(None)` means nothing matched: the order is missing or
  /// already terminal.
  async fn transition_open(
    &self,
    order_id: &str,
    finalization: &Finalization,
    at: DateTime<Utc>,
  ) -> Result<Option<Order>, LedgerError>;
}
