// storefront-core/src/gateway.rs

//! Contract with a hosted card payment gateway.

use crate::error::StoreResult;
use crate::money::Money;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A gateway-side order request. `receipt` carries the internal order id so the
/// gateway order can be correlated back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrderRequest {
  pub amount: Money,
  pub currency: String,
  pub receipt: String,
  /// Capture the payment as soon as it is authorised.
  pub auto_capture: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
  pub id: String,
  pub amount: Money,
  pub currency: String,
  #[serde(default)]
  pub receipt: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  /// Everything else the gateway returned, passed through untouched.
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The gateway's signed callback. Verified and then dropped, never stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
  #[serde(alias = "razorpay_order_id")]
  pub gateway_order_id: String,
  #[serde(alias = "razorpay_payment_id")]
  pub gateway_payment_id: String,
  #[serde(alias = "razorpay_signature")]
  pub signature: String,
}

impl fmt::Debug for PaymentProof {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PaymentProof")
      .field("gateway_order_id", &self.gateway_order_id)
      .field("gateway_payment_id", &self.gateway_payment_id)
      .field("signature", &"<redacted>")
      .finish()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutPrefill {
  pub name: Option<String>,
  pub email: Option<String>,
  pub contact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutTheme {
  pub color: String,
}

/// Options the client passes to the gateway's hosted payment UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedCheckout {
  pub key: String,
  pub amount: Money,
  pub currency: String,
  pub name: String,
  pub description: String,
  /// Gateway order id.
  pub order_id: String,
  /// Internal order id, when a ledger order exists.
  pub receipt: Option<String>,
  pub prefill: CheckoutPrefill,
  pub theme: CheckoutTheme,
}

/// What the hosted UI reported back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
  Captured(PaymentProof),
  /// The user closed the hosted UI.
  Dismissed,
  Failed { code: String, reason: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  /// Recorded as the order's payment method.
  fn name(&self) -> &str;

  /// Key id for the hosted UI; `None` when the gateway is not configured.
  fn public_key(&self) -> Option<&str>;

  /// Creates a gateway order. Not idempotent on the gateway side: call once per
  /// internal order.
  async fn create_order(&self, request: &GatewayOrderRequest) -> StoreResult<GatewayOrder>;

  async fn fetch_order(&self, gateway_order_id: &str) -> StoreResult<GatewayOrder>;
}
