// storefront-core/src/ledger/memory.rs

use super::store::OrderStore;
use crate::error::LedgerError;
use crate::order::{Finalization, NewOrder, Order, OrderLine};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Orders held in process memory. Every operation takes the lock once, so
/// `transition_open` is atomic with respect to concurrent callers.
#[derive(Default)]
pub struct MemoryOrderStore {
  orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.orders.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.orders.read().is_empty()
  }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
  async fn order_id_exists(&self, order_id: &str) -> Result<bool, LedgerError> {
    Ok(self.orders.read().contains_key(order_id))
  }

  async fn insert_header(&self, order: &NewOrder) -> Result<Order, LedgerError> {
    let mut orders = self.orders.write();
    if orders.contains_key(&order.order_id) {
      return Err(LedgerError::DuplicateOrderId {
        order_id: order.order_id.clone(),
      });
    }
    let stored = Order::from_new(order.clone(), Utc::now());
    orders.insert(stored.order_id.clone(), stored.clone());
    Ok(stored)
  }

  async fn insert_lines(&self, order_id: &str, lines: &[OrderLine]) -> Result<(), LedgerError> {
    let mut orders = self.orders.write();
    let order = orders.get_mut(order_id).ok_or_else(|| LedgerError::NotFound {
      order_id: order_id.to_string(),
    })?;
    order.lines = lines.to_vec();
    Ok(())
  }

  async fn delete_header(&self, order_id: &str) -> Result<(), LedgerError> {
    self.orders.write().remove(order_id);
    Ok(())
  }

  async fn find(&self, order_id: &str) -> Result<Option<Order>, LedgerError> {
    Ok(self.orders.read().get(order_id).cloned())
  }

  async fn transition_open(
    &self,
    order_id: &str,
    finalization: &Finalization,
    at: DateTime<Utc>,
  ) -> Result<Option<Order>, LedgerError> {
    let mut orders = self.orders.write();
    match orders.get_mut(order_id) {
      Some(order) if order.status.is_open() => {
        order.status = finalization.status;
        order.payment_reference = Some(finalization.payment_reference.clone());
        order.updated_at = at;
        Ok(Some(order.clone()))
      }
      _ => Ok(None),
    }
  }
}
