// storefront-core/src/money.rs

//! Currency amounts in integer minor units (paise for INR).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// GST applied to every cart and order subtotal.
pub const GST_RATE_PERCENT: i64 = 18;

/// An amount in minor currency units.
///
/// Serialized as a bare integer, which is also what the gateway expects for
/// `amount`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
  pub const ZERO: Money = Money(0);

  pub const fn from_minor(minor: i64) -> Self {
    Money(minor)
  }

  /// Whole major units, e.g. `Money::from_major(500)` is 500.00.
  pub const fn from_major(major: i64) -> Self {
    Money(major * 100)
  }

  pub const fn minor(self) -> i64 {
    self.0
  }

  pub fn is_negative(self) -> bool {
    self.0 < 0
  }

  pub fn times(self, quantity: u32) -> Money {
    Money(self.0.saturating_mul(i64::from(quantity)))
  }

  /// GST on this amount, rounded half-up to the nearest minor unit.
  pub fn gst(self) -> Money {
    let scaled = self.0.saturating_mul(GST_RATE_PERCENT);
    if scaled >= 0 {
      Money((scaled + 50) / 100)
    } else {
      Money((scaled - 50) / 100)
    }
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
  }
}

impl Add for Money {
  type Output = Money;

  fn add(self, rhs: Money) -> Money {
    Money(self.0.saturating_add(rhs.0))
  }
}

impl AddAssign for Money {
  fn add_assign(&mut self, rhs: Money) {
    *self = *self + rhs;
  }
}

impl Sub for Money {
  type Output = Money;

  fn sub(self, rhs: Money) -> Money {
    Money(self.0.saturating_sub(rhs.0))
  }
}

impl Sum for Money {
  fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
    iter.fold(Money::ZERO, Add::add)
  }
}
