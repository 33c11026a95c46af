// storefront-core/src/checkout/card.rs

//! Card checkout through a hosted gateway.
//!
//! The start pipeline runs `Idle` through `GatewayCheckoutOpen` and returns the
//! options for the hosted UI. The callback pipeline picks up from there when
//! the UI reports back, verifies the signature and finalizes the order.

use super::{with_timeout, AnonymousCheckoutPolicy, CardFlowState, CheckoutPermit, CheckoutServices};
use crate::cart::CartLine;
use crate::error::{StoreError, StoreResult};
use crate::flow::{skip_when, ContextData, Pipeline, PipelineControl};
use crate::gateway::{
  CallbackOutcome, CheckoutPrefill, CheckoutTheme, GatewayOrder, GatewayOrderRequest, HostedCheckout, PaymentProof,
};
use crate::identity::Identity;
use crate::ledger::OrderDraft;
use crate::money::Money;
use crate::order::{Order, OrderDetails, OrderStatus, PaymentMethod};
use crate::receipt::Receipt;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Reference recorded on a card order until the gateway reports a payment id.
pub const PENDING_PAYMENT_REFERENCE: &str = "Pending";

pub struct CardCheckoutCtx {
  pub identity: Identity,
  pub details: OrderDetails,
  pub state: CardFlowState,
  pub permit: Option<CheckoutPermit>,
  pub snapshot: Vec<CartLine>,
  pub order: Option<Order>,
  pub gateway_order: Option<GatewayOrder>,
  pub checkout: Option<HostedCheckout>,
}

impl CardCheckoutCtx {
  pub fn new(identity: Identity, details: OrderDetails) -> Self {
    Self {
      identity,
      details,
      state: CardFlowState::Idle,
      permit: None,
      snapshot: Vec::new(),
      order: None,
      gateway_order: None,
      checkout: None,
    }
  }
}

pub fn card_checkout_pipeline(services: Arc<CheckoutServices>) -> Pipeline<CardCheckoutCtx, StoreError> {
  let gateway_only = services.policy.anonymous == AnonymousCheckoutPolicy::GatewayOnly;
  let mut p = Pipeline::<CardCheckoutCtx, StoreError>::new(&[
    ("authorize_checkout", false, None),
    ("acquire_checkout_slot", false, None),
    ("snapshot_cart", false, None),
    ("check_gateway_configuration", false, None),
    (
      "create_ledger_order",
      false,
      skip_when(move |ctx: &CardCheckoutCtx| gateway_only && !ctx.identity.is_authenticated()),
    ),
    ("request_gateway_order", false, None),
    ("open_hosted_checkout", false, None),
  ]);

  let s = services.clone();
  p.on("authorize_checkout", move |ctx| authorize_checkout(ctx, s.clone()));
  let s = services.clone();
  p.on("acquire_checkout_slot", move |ctx| acquire_checkout_slot(ctx, s.clone()));
  let s = services.clone();
  p.on("snapshot_cart", move |ctx| snapshot_cart(ctx, s.clone()));
  let s = services.clone();
  p.on("check_gateway_configuration", move |ctx| check_gateway_configuration(ctx, s.clone()));
  let s = services.clone();
  p.on("create_ledger_order", move |ctx| create_ledger_order(ctx, s.clone()));
  let s = services.clone();
  p.on("request_gateway_order", move |ctx| request_gateway_order(ctx, s.clone()));
  let s = services;
  p.on("open_hosted_checkout", move |ctx| open_hosted_checkout(ctx, s.clone()));
  p
}

async fn authorize_checkout(
  ctx: ContextData<CardCheckoutCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  let authenticated = ctx.with(|c| c.identity.is_authenticated());
  if !authenticated && services.policy.anonymous == AnonymousCheckoutPolicy::Reject {
    return Err(StoreError::Unauthenticated("sign in to pay by card".to_string()));
  }
  Ok(PipelineControl::Continue)
}

async fn acquire_checkout_slot(
  ctx: ContextData<CardCheckoutCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  let key = ctx.with(|c| c.identity.checkout_key())?;
  let permit = services.guard.try_acquire(&key)?;
  ctx.update(|c| c.permit = Some(permit));
  Ok(PipelineControl::Continue)
}

async fn snapshot_cart(
  ctx: ContextData<CardCheckoutCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  let identity = ctx.with(|c| c.identity.clone());
  let snapshot = services.cart_snapshot(&identity).await?;
  ctx.update(|c| c.snapshot = snapshot);
  Ok(PipelineControl::Continue)
}

async fn check_gateway_configuration(
  _ctx: ContextData<CardCheckoutCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  if services.gateway.public_key().is_none() {
    return Err(StoreError::configuration(format!(
      "{} key is not configured; card payments are unavailable, try another method",
      services.gateway.name()
    )));
  }
  if !services.verifier.is_configured() {
    return Err(StoreError::configuration(
      "payment verification is not configured; card payments are unavailable, try another method",
    ));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "card::create_ledger_order", skip_all)]
async fn create_ledger_order(
  ctx: ContextData<CardCheckoutCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  let (identity, snapshot, details) = ctx.with(|c| (c.identity.clone(), c.snapshot.clone(), c.details.clone()));
  let draft = OrderDraft {
    payment_method: PaymentMethod::Card {
      gateway: services.gateway.name().to_string(),
    },
    status: OrderStatus::PendingPayment,
    payment_reference: Some(PENDING_PAYMENT_REFERENCE.to_string()),
    details,
  };
  let order = with_timeout(
    services.policy.external_call_timeout,
    "order create",
    services.ledger.create(&identity, &snapshot, draft),
  )
  .await?;

  ctx.update(|c| -> StoreResult<()> {
    c.state.advance(CardFlowState::OrderCreated)?;
    c.order = Some(order);
    Ok(())
  })?;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "card::request_gateway_order", skip_all)]
async fn request_gateway_order(
  ctx: ContextData<CardCheckoutCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  // Charge the ledger's total when there is an order; otherwise recompute from
  // the server-side cart. Never a client-supplied amount.
  let (amount, receipt) = ctx.with(|c| match &c.order {
    Some(order) => (order.total, order.order_id.clone()),
    None => {
      let subtotal: Money = c.snapshot.iter().map(CartLine::line_total).sum();
      (
        subtotal + subtotal.gst(),
        format!("receipt_order_{}", Utc::now().timestamp_millis()),
      )
    }
  });

  let request = GatewayOrderRequest {
    amount,
    currency: services.policy.currency.clone(),
    receipt: receipt.clone(),
    auto_capture: true,
  };
  let gateway_order = with_timeout(
    services.policy.external_call_timeout,
    "gateway order create",
    services.gateway.create_order(&request),
  )
  .await?;
  info!(receipt = %receipt, gateway_order_id = %gateway_order.id, amount = %amount, "Gateway order created.");

  ctx.update(|c| -> StoreResult<()> {
    c.state.advance(CardFlowState::GatewayOrderRequested)?;
    c.gateway_order = Some(gateway_order);
    Ok(())
  })?;
  Ok(PipelineControl::Continue)
}

async fn open_hosted_checkout(
  ctx: ContextData<CardCheckoutCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  let key = services
    .gateway
    .public_key()
    .ok_or_else(|| StoreError::configuration("gateway key is not configured"))?
    .to_string();
  let policy = &services.policy;

  ctx.update(|c| -> StoreResult<()> {
    let gateway_order = c
      .gateway_order
      .as_ref()
      .ok_or_else(|| StoreError::Gateway {
        message: "no gateway order to open checkout for".to_string(),
        details: None,
      })?;
    let prefill = c
      .identity
      .profile()
      .map(|p| CheckoutPrefill {
        name: p.name.clone(),
        email: p.email.clone(),
        contact: p.phone.clone(),
      })
      .unwrap_or_default();
    let checkout = HostedCheckout {
      key,
      amount: gateway_order.amount,
      currency: gateway_order.currency.clone(),
      name: policy.merchant_name.clone(),
      description: policy.description.clone(),
      order_id: gateway_order.id.clone(),
      receipt: c.order.as_ref().map(|o| o.order_id.clone()),
      prefill,
      theme: CheckoutTheme {
        color: policy.theme_color.clone(),
      },
    };
    c.state.advance(CardFlowState::GatewayCheckoutOpen)?;
    c.checkout = Some(checkout);
    Ok(())
  })?;
  Ok(PipelineControl::Continue)
}

// --- Callback ---

pub struct CardCallbackCtx {
  pub identity: Identity,
  /// Internal order id; `None` only for gateway-only anonymous checkout.
  pub order_id: Option<String>,
  pub outcome: CallbackOutcome,
  pub state: CardFlowState,
  pub order: Option<Order>,
  /// The order was already Paid when loaded; a duplicate callback.
  pub already_paid: bool,
  pub payment_id: Option<String>,
  pub receipt: Option<Receipt>,
}

impl CardCallbackCtx {
  pub fn new(identity: Identity, order_id: Option<String>, outcome: CallbackOutcome) -> Self {
    Self {
      identity,
      order_id,
      outcome,
      state: CardFlowState::GatewayCheckoutOpen,
      order: None,
      already_paid: false,
      payment_id: None,
      receipt: None,
    }
  }
}

pub fn card_callback_pipeline(services: Arc<CheckoutServices>) -> Pipeline<CardCallbackCtx, StoreError> {
  let no_order = || skip_when(|ctx: &CardCallbackCtx| ctx.order.is_none());
  let mut p = Pipeline::<CardCallbackCtx, StoreError>::new(&[
    ("load_order", false, None),
    ("record_callback_outcome", false, None),
    ("verify_signature", false, None),
    ("reconcile_gateway_order", false, no_order()),
    ("finalize_order", false, no_order()),
    ("clear_cart", false, skip_when(|ctx: &CardCallbackCtx| ctx.already_paid)),
    ("render_receipt", false, no_order()),
  ]);

  let s = services.clone();
  p.on("load_order", move |ctx| load_order(ctx, s.clone()));
  p.on("record_callback_outcome", record_callback_outcome);
  let s = services.clone();
  p.on("verify_signature", move |ctx| verify_signature(ctx, s.clone()));
  let s = services.clone();
  p.on("reconcile_gateway_order", move |ctx| reconcile_gateway_order(ctx, s.clone()));
  let s = services.clone();
  p.on("finalize_order", move |ctx| finalize_order(ctx, s.clone()));
  let s = services.clone();
  p.on("clear_cart", move |ctx| clear_cart(ctx, s.clone()));
  let s = services;
  p.on("render_receipt", move |ctx| render_receipt(ctx, s.clone()));
  p
}

async fn load_order(ctx: ContextData<CardCallbackCtx>, services: Arc<CheckoutServices>) -> StoreResult<PipelineControl> {
  let (identity, order_id) = ctx.with(|c| (c.identity.clone(), c.order_id.clone()));
  match order_id {
    Some(order_id) => {
      let order = services.load_owned_order(&identity, &order_id).await?;
      ctx.update(|c| {
        c.already_paid = order.status == OrderStatus::Paid;
        c.order = Some(order);
      });
    }
    None => {
      let gateway_only = services.policy.anonymous == AnonymousCheckoutPolicy::GatewayOnly;
      if identity.is_authenticated() || !gateway_only {
        return Err(StoreError::validation("order_id is required"));
      }
    }
  }
  Ok(PipelineControl::Continue)
}

async fn record_callback_outcome(ctx: ContextData<CardCallbackCtx>) -> StoreResult<PipelineControl> {
  ctx.update(|c| -> StoreResult<PipelineControl> {
    let order_id = c.order_id.clone().unwrap_or_default();
    match &c.outcome {
      CallbackOutcome::Captured(_) => {
        c.state.advance(CardFlowState::PaymentCaptured)?;
        Ok(PipelineControl::Continue)
      }
      CallbackOutcome::Dismissed => {
        info!(order_id = %order_id, "Hosted checkout dismissed; order stays pending payment.");
        c.state.advance(CardFlowState::PaymentCancelled)?;
        Ok(PipelineControl::Stop)
      }
      CallbackOutcome::Failed { code, reason } => {
        warn!(order_id = %order_id, code = %code, reason = %reason, "Gateway reported payment failure.");
        c.state.advance(CardFlowState::PaymentFailed)?;
        Ok(PipelineControl::Stop)
      }
    }
  })
}

#[instrument(name = "card::verify_signature", skip_all)]
async fn verify_signature(
  ctx: ContextData<CardCallbackCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  let proof = ctx.update(|c| -> StoreResult<PaymentProof> {
    c.state.advance(CardFlowState::VerificationInFlight)?;
    match &c.outcome {
      CallbackOutcome::Captured(proof) => Ok(proof.clone()),
      _ => Err(StoreError::validation("no payment proof to verify")),
    }
  })?;

  let valid = services
    .verifier
    .verify(&proof.gateway_order_id, &proof.gateway_payment_id, &proof.signature)?;
  if !valid {
    ctx.update(|c| c.state.advance(CardFlowState::VerificationFailed))?;
    warn!(
      gateway_order_id = %proof.gateway_order_id,
      gateway_payment_id = %proof.gateway_payment_id,
      security_event = true,
      "Payment signature mismatch."
    );
    return Err(StoreError::VerificationFailed {
      gateway_order_id: proof.gateway_order_id,
      reason: "signature mismatch".to_string(),
    });
  }

  ctx.update(|c| -> StoreResult<()> {
    c.state.advance(CardFlowState::Verified)?;
    c.payment_id = Some(proof.gateway_payment_id.clone());
    Ok(())
  })?;
  Ok(PipelineControl::Continue)
}

/// A valid signature only proves the gateway issued this payment; the gateway
/// order it paid must also be the one created for this internal order.
#[instrument(name = "card::reconcile_gateway_order", skip_all)]
async fn reconcile_gateway_order(
  ctx: ContextData<CardCallbackCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  let (gateway_order_id, expected) = ctx.with(|c| {
    let gateway_order_id = match &c.outcome {
      CallbackOutcome::Captured(proof) => proof.gateway_order_id.clone(),
      _ => String::new(),
    };
    let expected = c.order.as_ref().map(|o| (o.order_id.clone(), o.total));
    (gateway_order_id, expected)
  });
  let Some((order_id, total)) = expected else {
    return Ok(PipelineControl::Continue);
  };

  let gateway_order = with_timeout(
    services.policy.external_call_timeout,
    "gateway order fetch",
    services.gateway.fetch_order(&gateway_order_id),
  )
  .await?;

  let receipt_matches = gateway_order.receipt.as_deref() == Some(order_id.as_str());
  if !receipt_matches || gateway_order.amount != total {
    ctx.update(|c| c.state.advance(CardFlowState::VerificationFailed))?;
    warn!(
      order_id = %order_id,
      gateway_order_id = %gateway_order_id,
      gateway_receipt = gateway_order.receipt.as_deref().unwrap_or("-"),
      gateway_amount = %gateway_order.amount,
      order_total = %total,
      security_event = true,
      "Verified payment does not belong to this order."
    );
    return Err(StoreError::VerificationFailed {
      gateway_order_id,
      reason: "gateway order does not match the internal order".to_string(),
    });
  }
  Ok(PipelineControl::Continue)
}

async fn finalize_order(
  ctx: ContextData<CardCallbackCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  let (order_id, payment_id) = ctx.with(|c| {
    (
      c.order.as_ref().map(|o| o.order_id.clone()).unwrap_or_default(),
      c.payment_id.clone().unwrap_or_default(),
    )
  });
  let order = services.finalize_paid(&order_id, &payment_id).await?;
  ctx.update(|c| -> StoreResult<()> {
    c.state.advance(CardFlowState::OrderFinalized)?;
    c.order = Some(order);
    Ok(())
  })?;
  Ok(PipelineControl::Continue)
}

async fn clear_cart(ctx: ContextData<CardCallbackCtx>, services: Arc<CheckoutServices>) -> StoreResult<PipelineControl> {
  let (identity, order_id) = ctx.with(|c| (c.identity.clone(), c.order_id.clone()));
  services.clear_cart_after_payment(&identity, order_id.as_deref()).await;
  Ok(PipelineControl::Continue)
}

async fn render_receipt(
  ctx: ContextData<CardCallbackCtx>,
  services: Arc<CheckoutServices>,
) -> StoreResult<PipelineControl> {
  ctx.update(|c| {
    c.receipt = c.order.as_ref().map(|order| services.render_receipt(order));
  });
  Ok(PipelineControl::Continue)
}
