// storefront-core/src/checkout/guard.rs

use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// At most one checkout in flight per caller.
#[derive(Clone, Default)]
pub struct CheckoutGuard {
  in_flight: Arc<Mutex<HashSet<String>>>,
}

impl CheckoutGuard {
  pub fn new() -> Self {
    Self::default()
  }

  /// Claims `key`, or fails with `StoreError::CheckoutInProgress` if another
  /// checkout holds it. The claim is released when the permit drops.
  pub fn try_acquire(&self, key: &str) -> StoreResult<CheckoutPermit> {
    if !self.in_flight.lock().insert(key.to_string()) {
      warn!(checkout_key = %key, "Rejected concurrent checkout attempt.");
      return Err(StoreError::CheckoutInProgress);
    }
    Ok(CheckoutPermit {
      key: key.to_string(),
      in_flight: Arc::clone(&self.in_flight),
    })
  }

  pub fn is_held(&self, key: &str) -> bool {
    self.in_flight.lock().contains(key)
  }
}

#[derive(Debug)]
pub struct CheckoutPermit {
  key: String,
  in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for CheckoutPermit {
  fn drop(&mut self) {
    self.in_flight.lock().remove(&self.key);
  }
}
