// storefront-core/src/ledger/id.rs

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SUFFIX_MIN: u32 = 100_000;
const SUFFIX_MAX: u32 = 999_999;

/// Generates `PREFIX-######` order ids with a six-digit random suffix.
///
/// 900000 values is small enough to collide, so the ledger checks each id
/// before use.
pub struct OrderIdGenerator {
  prefix: String,
  rng: Mutex<StdRng>,
}

impl OrderIdGenerator {
  pub fn new(prefix: impl Into<String>) -> Self {
    Self {
      prefix: prefix.into(),
      rng: Mutex::new(StdRng::from_entropy()),
    }
  }

  /// Deterministic sequence, for tests.
  pub fn seeded(prefix: impl Into<String>, seed: u64) -> Self {
    Self {
      prefix: prefix.into(),
      rng: Mutex::new(StdRng::seed_from_u64(seed)),
    }
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  pub fn next_id(&self) -> String {
    let suffix = self.rng.lock().gen_range(SUFFIX_MIN..=SUFFIX_MAX);
    format!("{}-{}", self.prefix, suffix)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ids_have_prefix_and_six_digits() {
    let ids = OrderIdGenerator::new("VT");
    for _ in 0..200 {
      let id = ids.next_id();
      let (prefix, digits) = id.split_once('-').unwrap();
      assert_eq!(prefix, "VT");
      assert_eq!(digits.len(), 6);
      let n: u32 = digits.parse().unwrap();
      assert!((SUFFIX_MIN..=SUFFIX_MAX).contains(&n));
    }
  }

  #[test]
  fn seeded_generators_repeat() {
    let a = OrderIdGenerator::seeded("VT", 7);
    let b = OrderIdGenerator::seeded("VT", 7);
    assert_eq!(a.next_id(), b.next_id());
  }
}
