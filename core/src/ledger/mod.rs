// storefront-core/src/ledger/mod.rs

//! The Order Ledger: creates durable orders from cart snapshots and moves each
//! order to a terminal state exactly once.

mod id;
mod memory;
mod store;

pub use id::OrderIdGenerator;
pub use memory::MemoryOrderStore;
pub use store::OrderStore;

use crate::cart::CartLine;
use crate::error::{LedgerError, StoreError, StoreResult};
use crate::identity::Identity;
use crate::money::Money;
use crate::order::{Finalization, NewOrder, Order, OrderDetails, OrderLine, OrderStatus, PaymentMethod};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct LedgerConfig {
  pub order_id_prefix: String,
  /// How many ids to try before giving up on a create.
  pub max_id_attempts: u32,
}

impl Default for LedgerConfig {
  fn default() -> Self {
    Self {
      order_id_prefix: "VT".to_string(),
      max_id_attempts: 5,
    }
  }
}

/// How the order should be recorded; totals are not part of it because the
/// ledger computes them from the snapshot.
#[derive(Debug, Clone)]
pub struct OrderDraft {
  pub payment_method: PaymentMethod,
  pub status: OrderStatus,
  pub payment_reference: Option<String>,
  pub details: OrderDetails,
}

pub struct OrderLedger {
  store: Arc<dyn OrderStore>,
  ids: OrderIdGenerator,
  config: LedgerConfig,
}

impl OrderLedger {
  pub fn new(store: Arc<dyn OrderStore>, config: LedgerConfig) -> Self {
    let ids = OrderIdGenerator::new(config.order_id_prefix.clone());
    Self { store, ids, config }
  }

  pub fn with_id_generator(store: Arc<dyn OrderStore>, ids: OrderIdGenerator, config: LedgerConfig) -> Self {
    Self { store, ids, config }
  }

  /// Records a new order from `snapshot` for an authenticated `identity`.
  ///
  /// Subtotal, tax and total are computed here from the snapshot. The header and
  /// lines are written separately; if the lines fail the header is deleted again
  /// so no order exists without its lines. The live cart is not touched.
  #[instrument(
    name = "OrderLedger::create",
    skip(self, identity, snapshot, draft),
    fields(lines = snapshot.len(), status = %draft.status, order_id = tracing::field::Empty),
    err(Display)
  )]
  pub async fn create(&self, identity: &Identity, snapshot: &[CartLine], draft: OrderDraft) -> StoreResult<Order> {
    if snapshot.is_empty() {
      return Err(StoreError::validation("cannot create an order from an empty cart"));
    }
    if let Some(line) = snapshot.iter().find(|l| l.quantity == 0) {
      return Err(StoreError::validation(format!("line '{}' has zero quantity", line.product_id)));
    }
    if !draft.status.is_open() {
      return Err(StoreError::validation(format!(
        "a new order must start open, not {}",
        draft.status
      )));
    }
    draft.details.validate()?;
    let user = identity.require_user()?;

    let lines: Vec<OrderLine> = snapshot.iter().map(OrderLine::from).collect();
    let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
    let tax = subtotal.gst();
    let now = Utc::now();

    let mut new_order = NewOrder {
      order_id: String::new(),
      user_id: Some(user.user_id.clone()),
      lines,
      subtotal,
      tax,
      total: subtotal + tax,
      payment_method: draft.payment_method,
      payment_reference: draft.payment_reference,
      status: draft.status,
      details: draft.details,
      date: now.date_naive(),
    };

    let header = self.insert_header_with_fresh_id(&mut new_order).await?;
    tracing::Span::current().record("order_id", header.order_id.as_str());

    if let Err(line_err) = self.store.insert_lines(&header.order_id, &new_order.lines).await {
      warn!(order_id = %header.order_id, error = %line_err, "Order lines failed; rolling back header.");
      if let Err(delete_err) = self.store.delete_header(&header.order_id).await {
        error!(order_id = %header.order_id, error = %delete_err, "Rollback of order header failed; orphan header left behind.");
      }
      return Err(StoreError::OrderCreation(format!("failed to save order items: {}", line_err)));
    }

    info!(order_id = %header.order_id, total = %header.total, "Order created.");
    Ok(Order {
      lines: new_order.lines,
      ..header
    })
  }

  async fn insert_header_with_fresh_id(&self, new_order: &mut NewOrder) -> StoreResult<Order> {
    for attempt in 1..=self.config.max_id_attempts {
      let candidate = self.ids.next_id();
      let taken = self
        .store
        .order_id_exists(&candidate)
        .await
        .map_err(|e| StoreError::OrderCreation(e.to_string()))?;
      if taken {
        debug!(attempt, order_id = %candidate, "Order id already taken, drawing another.");
        continue;
      }

      new_order.order_id = candidate;
      match self.store.insert_header(new_order).await {
        Ok(order) => return Ok(order),
        Err(LedgerError::DuplicateOrderId { order_id }) => {
          debug!(attempt, order_id = %order_id, "Order id raced with another insert, drawing another.");
        }
        Err(e) => return Err(StoreError::OrderCreation(e.to_string())),
      }
    }
    Err(StoreError::OrderCreation(format!(
      "no free order id after {} attempts",
      self.config.max_id_attempts
    )))
  }

  /// Moves an open order to `status`, recording `payment_reference`.
  ///
  /// Only `Pending` and `PendingPayment` orders move. Repeating the exact same
  /// finalization returns the stored order unchanged; any other attempt on a
  /// terminal order is a `LedgerError::Conflict`, so a `Paid` order never
  /// regresses.
  #[instrument(name = "OrderLedger::finalize", skip(self, payment_reference), fields(status = %status), err(Display))]
  pub async fn finalize(&self, order_id: &str, payment_reference: &str, status: OrderStatus) -> StoreResult<Order> {
    if order_id.trim().is_empty() {
      return Err(StoreError::OrderUpdate(LedgerError::NotFound {
        order_id: order_id.to_string(),
      }));
    }
    if !status.is_terminal() {
      return Err(StoreError::validation(format!("cannot finalize an order as {}", status)));
    }

    let finalization = Finalization {
      status,
      payment_reference: payment_reference.to_string(),
    };
    let updated = self
      .store
      .transition_open(order_id, &finalization, Utc::now())
      .await
      .map_err(StoreError::OrderUpdate)?;
    if let Some(order) = updated {
      info!(order_id = %order.order_id, status = %order.status, "Order finalized.");
      return Ok(order);
    }

    let current = self.store.find(order_id).await.map_err(StoreError::OrderUpdate)?;
    match current {
      None => Err(StoreError::OrderUpdate(LedgerError::NotFound {
        order_id: order_id.to_string(),
      })),
      Some(order) if order.status == status && order.payment_reference.as_deref() == Some(payment_reference) => {
        debug!(order_id = %order.order_id, "Finalize replayed with identical outcome.");
        Ok(order)
      }
      Some(order) => {
        warn!(order_id = %order.order_id, current = %order.status, requested = %status, "Refusing to re-finalize order.");
        Err(StoreError::OrderUpdate(LedgerError::Conflict {
          order_id: order.order_id,
          current: order.status,
          requested: status,
        }))
      }
    }
  }

  pub async fn find(&self, order_id: &str) -> StoreResult<Option<Order>> {
    self.store.find(order_id).await.map_err(|e| StoreError::Storage(e.into()))
  }
}
