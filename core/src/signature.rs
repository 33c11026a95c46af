// storefront-core/src/signature.rs

//! HMAC-SHA256 verification of gateway payment callbacks.
//!
//! The gateway signs `"{order_id}|{payment_id}"` with the shared key secret and
//! sends the lowercase hex digest. Verification recomputes it and compares in
//! constant time. This runs on the server only.

use crate::error::{StoreError, StoreResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// `hex(HMAC_SHA256(secret, order_id + "|" + payment_id))`.
pub fn compute_signature(order_id: &str, payment_id: &str, secret: &str) -> StoreResult<String> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|e| StoreError::configuration(format!("unusable payment gateway secret: {}", e)))?;
  mac.update(order_id.as_bytes());
  mac.update(b"|");
  mac.update(payment_id.as_bytes());
  Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `signature` against the expected digest.
///
/// A missing or empty secret is a `StoreError::Configuration`, kept apart from
/// a plain mismatch (`Ok(false)`).
pub fn verify(order_id: &str, payment_id: &str, signature: &str, secret: Option<&str>) -> StoreResult<bool> {
  let secret = match secret {
    Some(s) if !s.is_empty() => s,
    _ => return Err(StoreError::configuration("payment gateway secret is not configured")),
  };
  let expected = compute_signature(order_id, payment_id, secret)?;
  Ok(constant_time_eq(expected.as_bytes(), signature.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
  if a.len() != b.len() {
    return false;
  }
  a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Holds the gateway key secret for the lifetime of the process.
#[derive(Clone)]
pub struct SignatureVerifier {
  secret: Option<String>,
}

impl fmt::Debug for SignatureVerifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SignatureVerifier")
      .field("configured", &self.is_configured())
      .finish()
  }
}

impl SignatureVerifier {
  pub fn new(secret: Option<String>) -> Self {
    Self {
      secret: secret.filter(|s| !s.is_empty()),
    }
  }

  pub fn is_configured(&self) -> bool {
    self.secret.is_some()
  }

  pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> StoreResult<bool> {
    verify(order_id, payment_id, signature, self.secret.as_deref())
  }

  pub fn sign(&self, order_id: &str, payment_id: &str) -> StoreResult<String> {
    let secret = self
      .secret
      .as_deref()
      .ok_or_else(|| StoreError::configuration("payment gateway secret is not configured"))?;
    compute_signature(order_id, payment_id, secret)
  }
}
