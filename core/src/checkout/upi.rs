// storefront-core/src/checkout/upi.rs

//! UPI checkout against a static merchant VPA.
//!
//! There is no gateway callback for UPI, so the user's "I have paid" is only a
//! prompt to look: the order becomes Paid only when a [`SettlementCheck`]
//! confirms the money arrived.

use super::{with_timeout, CheckoutPermit, CheckoutServices};
use crate::cart::CartLine;
use crate::error::{StoreError, StoreResult};
use crate::flow::{skip_when, ContextData, Pipeline, PipelineControl};
use crate::identity::Identity;
use crate::ledger::OrderDraft;
use crate::money::Money;
use crate::order::{Order, OrderDetails, OrderStatus, PaymentMethod};
use crate::receipt::Receipt;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "settlement", rename_all = "snake_case")]
pub enum Settlement {
  /// Funds received; `reference` is the bank/UTR reference.
  Settled { reference: String },
  /// Nothing received yet.
  Unsettled,
  /// Something arrived but it cannot be matched to the order.
  Rejected { reason: String },
}

/// Server-side confirmation that a UPI payment actually settled.
#[async_trait]
pub trait SettlementCheck: Send + Sync {
  async fn check(&self, order_id: &str, expected_amount: Money) -> StoreResult<Settlement>;
}

#[derive(Debug, Clone)]
struct SettlementRecord {
  reference: String,
  amount: Money,
}

/// Settlements recorded by an operator or a bank feed, held in memory.
#[derive(Default)]
pub struct MemorySettlements {
  records: RwLock<HashMap<String, SettlementRecord>>,
}

impl MemorySettlements {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&self, order_id: impl Into<String>, reference: impl Into<String>, amount: Money) {
    self.records.write().insert(
      order_id.into(),
      SettlementRecord {
        reference: reference.into(),
        amount,
      },
    );
  }
}

#[async_trait]
impl SettlementCheck for MemorySettlements {
  async fn check(&self, order_id: &str, expected_amount: Money) -> StoreResult<Settlement> {
    Ok(match self.records.read().get(order_id) {
      None => Settlement::Unsettled,
      Some(record) if record.amount != expected_amount => Settlement::Rejected {
        reason: format!("settled {} but order total is {}", record.amount, expected_amount),
      },
      Some(record) => Settlement::Settled {
        reference: record.reference.clone(),
      },
    })
  }
}

/// Where and how much to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpiPaymentTarget {
  pub vpa: String,
  pub payee_name: String,
  pub amount: Money,
  pub currency: String,
  pub note: String,
  /// `upi://pay` link; also the QR payload.
  pub deep_link: String,
}

/// Builds `upi://pay?pa=..&pn=..&am=..&cu=..&tn=..`.
pub fn upi_deep_link(vpa: &str, payee_name: &str, amount: Money, currency: &str, note: &str) -> String {
  let query = url::form_urlencoded::Serializer::new(String::new())
    .append_pair("pa", vpa)
    .append_pair("pn", payee_name)
    .append_pair("am", &amount.to_string())
    .append_pair("cu", currency)
    .append_pair("tn", note)
    .finish();
  format!("upi://pay?{}", query)
}

pub struct UpiCheckoutCtx {
  pub identity: Identity,
  pub details: OrderDetails,
  pub permit: Option<CheckoutPermit>,
  pub snapshot: Vec<CartLine>,
  pub order: Option<Order>,
  pub target: Option<UpiPaymentTarget>,
}

impl UpiCheckoutCtx {
  pub fn new(identity: Identity, details: OrderDetails) -> Self {
    Self {
      identity,
      details,
      permit: None,
      snapshot: Vec::new(),
      order: None,
      target: None,
    }
  }
}

pub fn upi_checkout_pipeline(services: Arc<CheckoutServices>) -> Pipeline<UpiCheckoutCtx, StoreError> {
  let mut p = Pipeline::<UpiCheckoutCtx, StoreError>::new(&[
    ("authorize_checkout", false, None),
    ("acquire_checkout_slot", false, None),
    ("snapshot_cart", false, None),
    ("create_ledger_order", false, None),
    ("present_payment_target", false, None),
  ]);

  let s = services.clone();
  p.on("authorize_checkout", move |ctx| authorize_upi(ctx, s.clone()));
  let s = services.clone();
  p.on("acquire_checkout_slot", move |ctx: ContextData<UpiCheckoutCtx>| {
    let s = s.clone();
    async move {
      let key = ctx.with(|c| c.identity.checkout_key())?;
      let permit = s.guard.try_acquire(&key)?;
      ctx.update(|c| c.permit = Some(permit));
      Ok::<_, StoreError>(PipelineControl::Continue)
    }
  });
  let s = services.clone();
  p.on("snapshot_cart", move |ctx: ContextData<UpiCheckoutCtx>| {
    let s = s.clone();
    async move {
      let identity = ctx.with(|c| c.identity.clone());
      let snapshot = s.cart_snapshot(&identity).await?;
      ctx.update(|c| c.snapshot = snapshot);
      Ok::<_, StoreError>(PipelineControl::Continue)
    }
  });
  let s = services.clone();
  p.on("create_ledger_order", move |ctx| create_upi_order(ctx, s.clone()));
  let s = services;
  p.on("present_payment_target", move |ctx| present_payment_target(ctx, s.clone()));
  p
}

async fn authorize_upi(ctx: ContextData<UpiCheckoutCtx>, services: Arc<CheckoutServices>) -> StoreResult<PipelineControl> {
  // No cryptographic proof exists for UPI, so there is no anonymous variant.
  ctx.with(|c| c.identity.require_user().map(|_| ()))?;
  if services.policy.merchant_upi_id.is_none() {
    return Err(StoreError::configuration(
      "merchant UPI id is not configured; UPI is unavailable, try another method",
    ));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "upi::create_ledger_order", skip_all)]
async fn create_upi_order(ctx: ContextData<UpiCheckoutCtx>, services: Arc<CheckoutServices>) -> StoreResult<PipelineControl> {
  let (identity, snapshot, details) = ctx.with(|c| (c.identity.clone(), c.snapshot.clone(), c.details.clone()));
  let draft = OrderDraft {
    payment_method: PaymentMethod::Upi,
    status: OrderStatus::Pending,
    payment_reference: None,
    details,
  };
  let order = with_timeout(
    services.policy.external_call_timeout,
    "order create",
    services.ledger.create(&identity, &snapshot, draft),
  )
  .await?;
  ctx.update(|c| c.order = Some(order));
  Ok(PipelineControl::Continue)
}

async fn present_payment_target(
  ctx: ContextData<UpiCheckoutCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  let policy = &services.policy;
  let vpa = policy
    .merchant_upi_id
    .clone()
    .ok_or_else(|| StoreError::configuration("merchant UPI id is not configured"))?;

  ctx.update(|c| -> StoreResult<()> {
    let order = c
      .order
      .as_ref()
      .ok_or_else(|| StoreError::OrderCreation("no order to pay for".to_string()))?;
    let note = format!("Order {}", order.order_id);
    let deep_link = upi_deep_link(&vpa, &policy.merchant_name, order.total, &policy.currency, &note);
    c.target = Some(UpiPaymentTarget {
      vpa,
      payee_name: policy.merchant_name.clone(),
      amount: order.total,
      currency: policy.currency.clone(),
      note,
      deep_link,
    });
    Ok(())
  })?;
  Ok(PipelineControl::Continue)
}

// --- Confirmation ---

pub struct UpiConfirmCtx {
  pub identity: Identity,
  pub order_id: String,
  pub order: Option<Order>,
  /// The order was already Paid when loaded; this run only replays.
  pub already_paid: bool,
  pub settlement: Option<Settlement>,
  pub receipt: Option<Receipt>,
}

impl UpiConfirmCtx {
  pub fn new(identity: Identity, order_id: impl Into<String>) -> Self {
    Self {
      identity,
      order_id: order_id.into(),
      order: None,
      already_paid: false,
      settlement: None,
      receipt: None,
    }
  }
}

pub fn upi_confirm_pipeline(services: Arc<CheckoutServices>) -> Pipeline<UpiConfirmCtx, StoreError> {
  let mut p = Pipeline::<UpiConfirmCtx, StoreError>::new(&[
    ("load_order", false, None),
    ("check_settlement", false, None),
    ("finalize_order", false, None),
    ("clear_cart", false, skip_when(|c: &UpiConfirmCtx| c.already_paid)),
    ("render_receipt", false, skip_when(|c: &UpiConfirmCtx| c.order.is_none())),
  ]);

  let s = services.clone();
  p.on("load_order", move |ctx: ContextData<UpiConfirmCtx>| {
    let s = s.clone();
    async move {
      let (identity, order_id) = ctx.with(|c| (c.identity.clone(), c.order_id.clone()));
      let order = s.load_owned_order(&identity, &order_id).await?;
      if order.payment_method != PaymentMethod::Upi {
        return Err(StoreError::validation(format!("order {} is not a UPI order", order_id)));
      }
      ctx.update(|c| {
        c.already_paid = order.status == OrderStatus::Paid;
        c.order = Some(order);
      });
      Ok::<_, StoreError>(PipelineControl::Continue)
    }
  });
  let s = services.clone();
  p.on("check_settlement", move |ctx| check_settlement(ctx, s.clone()));
  let s = services.clone();
  p.on("finalize_order", move |ctx: ContextData<UpiConfirmCtx>| {
    let s = s.clone();
    async move {
      let (order_id, reference) = ctx.with(|c| {
        let reference = match &c.settlement {
          Some(Settlement::Settled { reference }) => reference.clone(),
          _ => String::new(),
        };
        (c.order_id.clone(), reference)
      });
      let order = s.finalize_paid(&order_id, &reference).await?;
      ctx.update(|c| c.order = Some(order));
      Ok::<_, StoreError>(PipelineControl::Continue)
    }
  });
  let s = services.clone();
  p.on("clear_cart", move |ctx: ContextData<UpiConfirmCtx>| {
    let s = s.clone();
    async move {
      let (identity, order_id) = ctx.with(|c| (c.identity.clone(), c.order_id.clone()));
      s.clear_cart_after_payment(&identity, Some(order_id.as_str())).await;
      Ok::<_, StoreError>(PipelineControl::Continue)
    }
  });
  let s = services;
  p.on("render_receipt", move |ctx: ContextData<UpiConfirmCtx>| {
    let s = s.clone();
    async move {
      ctx.update(|c| c.receipt = c.order.as_ref().map(|o| s.render_receipt(o)));
      Ok::<_, StoreError>(PipelineControl::Continue)
    }
  });
  p
}

#[instrument(name = "upi::check_settlement", skip_all)]
async fn check_settlement(ctx: ContextData<UpiConfirmCtx>, services: Arc<CheckoutServices>) -> StoreResult<PipelineControl> {
  let (order_id, total, already_paid_ref) = ctx.with(|c| {
    let order = c.order.as_ref();
    (
      c.order_id.clone(),
      order.map(|o| o.total).unwrap_or_default(),
      order
        .filter(|o| o.status == OrderStatus::Paid)
        .and_then(|o| o.payment_reference.clone()),
    )
  });

  let settlement = match already_paid_ref {
    // Reloaded confirmation page; the finalize below replays idempotently.
    Some(reference) => Settlement::Settled { reference },
    None => {
      with_timeout(
        services.policy.external_call_timeout,
        "settlement check",
        services.settlements.check(&order_id, total),
      )
      .await?
    }
  };

  let control = match &settlement {
    Settlement::Settled { reference } => {
      info!(order_id = %order_id, reference = %reference, "UPI settlement confirmed.");
      Ok(PipelineControl::Continue)
    }
    Settlement::Unsettled => {
      info!(order_id = %order_id, "UPI payment not settled yet; order stays pending.");
      Ok(PipelineControl::Stop)
    }
    Settlement::Rejected { reason } => {
      warn!(order_id = %order_id, reason = %reason, security_event = true, "UPI settlement rejected.");
      Err(StoreError::PaymentFailed {
        code: "SETTLEMENT_REJECTED".to_string(),
        reason: reason.clone(),
      })
    }
  };
  ctx.update(|c| c.settlement = Some(settlement));
  control
}
