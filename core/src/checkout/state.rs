// storefront-core/src/checkout/state.rs

use crate::error::{FlowError, StoreError, StoreResult};
use serde::Serialize;
use std::fmt;

/// Where a card checkout stands. Each pipeline step advances it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardFlowState {
  Idle,
  OrderCreated,
  GatewayOrderRequested,
  GatewayCheckoutOpen,
  PaymentCaptured,
  PaymentCancelled,
  PaymentFailed,
  VerificationInFlight,
  Verified,
  VerificationFailed,
  OrderFinalized,
}

impl CardFlowState {
  pub fn can_advance_to(self, next: CardFlowState) -> bool {
    use CardFlowState::*;
    matches!(
      (self, next),
      (Idle, OrderCreated)
        // Anonymous gateway-only checkout has no ledger order.
        | (Idle, GatewayOrderRequested)
        | (OrderCreated, GatewayOrderRequested)
        | (GatewayOrderRequested, GatewayCheckoutOpen)
        | (GatewayCheckoutOpen, PaymentCaptured)
        | (GatewayCheckoutOpen, PaymentCancelled)
        | (GatewayCheckoutOpen, PaymentFailed)
        | (PaymentCaptured, VerificationInFlight)
        | (VerificationInFlight, Verified)
        | (VerificationInFlight, VerificationFailed)
        // Reconciliation against the gateway order can still reject.
        | (Verified, VerificationFailed)
        | (Verified, OrderFinalized)
    )
  }

  /// Moves to `next` or fails with an internal flow error naming both states.
  pub fn advance(&mut self, next: CardFlowState) -> StoreResult<()> {
    if !self.can_advance_to(next) {
      return Err(StoreError::Flow(FlowError::Internal(format!(
        "illegal card checkout transition {} -> {}",
        self, next
      ))));
    }
    *self = next;
    Ok(())
  }

  /// The user can start checkout again from here.
  pub fn leaves_cart_intact(self) -> bool {
    !matches!(self, CardFlowState::Verified | CardFlowState::OrderFinalized)
  }
}

impl fmt::Display for CardFlowState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}
