// storefront-core/src/checkout/mod.rs

//! Card and UPI checkout, each expressed as pipelines of named steps.
//!
//! | Flow | Context | Runs when |
//! |---|---|---|
//! | card start | [`CardCheckoutCtx`] | the user picks card payment |
//! | card callback | [`CardCallbackCtx`] | the hosted UI reports back |
//! | UPI start | [`UpiCheckoutCtx`] | the user picks UPI |
//! | UPI confirm | [`UpiConfirmCtx`] | the user says they have paid |

mod card;
mod guard;
mod state;
mod upi;

pub use card::{card_callback_pipeline, card_checkout_pipeline, CardCallbackCtx, CardCheckoutCtx};
pub use guard::{CheckoutGuard, CheckoutPermit};
pub use state::CardFlowState;
pub use upi::{
  upi_checkout_pipeline, upi_confirm_pipeline, upi_deep_link, MemorySettlements, Settlement, SettlementCheck,
  UpiCheckoutCtx, UpiConfirmCtx, UpiPaymentTarget,
};

use crate::cart::{CartBackends, CartLine, CartStore};
use crate::error::{FlowError, StoreError, StoreResult};
use crate::flow::FlowRegistry;
use crate::gateway::PaymentGateway;
use crate::identity::Identity;
use crate::ledger::OrderLedger;
use crate::order::Order;
use crate::receipt::{Receipt, ReceiptIssuer};
use crate::signature::SignatureVerifier;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// What to do when an anonymous caller starts a card checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnonymousCheckoutPolicy {
  /// Require sign-in.
  #[default]
  Reject,
  /// Go straight to the gateway without a ledger order. Verification still runs.
  GatewayOnly,
}

#[derive(Debug, Clone)]
pub struct CheckoutPolicy {
  pub anonymous: AnonymousCheckoutPolicy,
  pub currency: String,
  pub merchant_name: String,
  pub description: String,
  pub theme_color: String,
  /// Static VPA shown for UPI; `None` disables UPI checkout.
  pub merchant_upi_id: Option<String>,
  pub external_call_timeout: Duration,
  pub issuer: ReceiptIssuer,
}

impl Default for CheckoutPolicy {
  fn default() -> Self {
    Self {
      anonymous: AnonymousCheckoutPolicy::default(),
      currency: "INR".to_string(),
      merchant_name: "Storefront".to_string(),
      description: "Order payment".to_string(),
      theme_color: "#3399cc".to_string(),
      merchant_upi_id: None,
      external_call_timeout: Duration::from_secs(15),
      issuer: ReceiptIssuer::default(),
    }
  }
}

/// Everything the checkout steps call out to. Built once at startup.
pub struct CheckoutServices {
  pub ledger: Arc<OrderLedger>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub verifier: SignatureVerifier,
  pub settlements: Arc<dyn SettlementCheck>,
  pub carts: CartBackends,
  pub guard: CheckoutGuard,
  pub policy: CheckoutPolicy,
}

/// Registers the four checkout pipelines with `registry`.
pub fn register_checkout_flows<AppErr>(registry: &FlowRegistry<AppErr>, services: Arc<CheckoutServices>)
where
  AppErr: std::error::Error + From<FlowError> + From<StoreError> + Send + Sync + 'static,
{
  registry.register(card_checkout_pipeline(services.clone()));
  registry.register(card_callback_pipeline(services.clone()));
  registry.register(upi_checkout_pipeline(services.clone()));
  registry.register(upi_confirm_pipeline(services));
}

/// Bounds an external call by `limit`.
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> StoreResult<T>
where
  F: Future<Output = StoreResult<T>>,
{
  match tokio::time::timeout(limit, fut).await {
    Ok(result) => result,
    Err(_) => {
      warn!(operation, timeout_ms = limit.as_millis() as u64, "External call timed out.");
      Err(StoreError::Timeout {
        operation: operation.to_string(),
      })
    }
  }
}

impl CheckoutServices {
  pub(crate) async fn cart_snapshot(&self, identity: &Identity) -> StoreResult<Vec<CartLine>> {
    let carts = self.carts.clone();
    let store = with_timeout(
      self.policy.external_call_timeout,
      "cart load",
      CartStore::open(identity, carts),
    )
    .await?;
    let snapshot = store.snapshot();
    if snapshot.is_empty() {
      return Err(StoreError::validation("your cart is empty"));
    }
    Ok(snapshot)
  }

  /// Clears the caller's cart after a successful order. Failure is logged, not
  /// returned: the payment already went through.
  pub(crate) async fn clear_cart_after_payment(&self, identity: &Identity, order_id: Option<&str>) {
    let carts = self.carts.clone();
    let cleared = with_timeout(self.policy.external_call_timeout, "cart clear", async move {
      let mut store = CartStore::open(identity, carts).await?;
      store.clear().await
    })
    .await;
    if let Err(e) = cleared {
      warn!(order_id = order_id.unwrap_or("-"), error = %e, "Payment recorded but cart could not be cleared.");
    }
  }

  /// Loads `order_id` and checks it belongs to `identity`. Someone else's order
  /// is reported as not found.
  pub(crate) async fn load_owned_order(&self, identity: &Identity, order_id: &str) -> StoreResult<Order> {
    let user = identity.require_user()?;
    let found = with_timeout(
      self.policy.external_call_timeout,
      "order lookup",
      self.ledger.find(order_id),
    )
    .await?;
    match found {
      Some(order) if order.is_owned_by(&user.user_id) => Ok(order),
      _ => Err(StoreError::NotFound(format!("order {}", order_id))),
    }
  }

  pub(crate) fn render_receipt(&self, order: &Order) -> Receipt {
    Receipt::render(order, &order.lines, &order.payment_method).with_issuer(self.policy.issuer.clone())
  }

  /// Finalize as Paid after money has moved. Any failure here is the severe
  /// case and needs a human.
  pub(crate) async fn finalize_paid(&self, order_id: &str, payment_reference: &str) -> StoreResult<Order> {
    let finalized = with_timeout(
      self.policy.external_call_timeout,
      "order finalize",
      self
        .ledger
        .finalize(order_id, payment_reference, crate::order::OrderStatus::Paid),
    )
    .await;
    finalized.map_err(|e| {
      error!(
        order_id,
        payment_id = payment_reference,
        error = %e,
        reconciliation = "manual",
        "Payment verified but order could not be finalized."
      );
      StoreError::FinalizeAfterVerification {
        order_id: order_id.to_string(),
        payment_id: payment_reference.to_string(),
        reason: e.to_string(),
      }
    })
  }
}
