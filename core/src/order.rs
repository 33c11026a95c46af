// storefront-core/src/order.rs

//! Order records as the ledger stores them.

use crate::cart::CartLine;
use crate::error::{StoreError, StoreResult};
use crate::identity::UserId;
use crate::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
  Pending,
  PendingPayment,
  Paid,
  Failed,
  Cancelled,
}

impl OrderStatus {
  pub const OPEN: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::PendingPayment];

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "Pending",
      OrderStatus::PendingPayment => "PendingPayment",
      OrderStatus::Paid => "Paid",
      OrderStatus::Failed => "Failed",
      OrderStatus::Cancelled => "Cancelled",
    }
  }

  /// Still waiting on payment; the only states `finalize` may move.
  pub fn is_open(self) -> bool {
    matches!(self, OrderStatus::Pending | OrderStatus::PendingPayment)
  }

  pub fn is_terminal(self) -> bool {
    !self.is_open()
  }

  pub fn can_transition_to(self, next: OrderStatus) -> bool {
    match (self, next) {
      (OrderStatus::Pending, OrderStatus::PendingPayment) => true,
      (from, to) => from.is_open() && to.is_terminal(),
    }
  }

  /// Human label used on receipts.
  pub fn label(self) -> &'static str {
    match self {
      OrderStatus::Pending => "Awaiting payment",
      OrderStatus::PendingPayment => "Payment pending",
      OrderStatus::Paid => "Paid",
      OrderStatus::Failed => "Payment failed",
      OrderStatus::Cancelled => "Cancelled",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOrderStatus(pub String);

impl fmt::Display for UnknownOrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "unknown order status '{}'", self.0)
  }
}

impl std::error::Error for UnknownOrderStatus {}

impl FromStr for OrderStatus {
  type Err = UnknownOrderStatus;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Pending" => Ok(OrderStatus::Pending),
      "PendingPayment" => Ok(OrderStatus::PendingPayment),
      "Paid" => Ok(OrderStatus::Paid),
      "Failed" => Ok(OrderStatus::Failed),
      "Cancelled" => Ok(OrderStatus::Cancelled),
      other => Err(UnknownOrderStatus(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentMethod {
  Upi,
  /// Card payment through a hosted gateway, tagged with the gateway's name.
  Card { gateway: String },
  /// Anything recorded by another channel.
  Other { name: String },
}

impl PaymentMethod {
  /// Value stored in the `payment_method` column.
  pub fn as_stored(&self) -> &str {
    match self {
      PaymentMethod::Upi => "UPI",
      PaymentMethod::Card { gateway } => gateway,
      PaymentMethod::Other { name } => name,
    }
  }

  pub fn from_stored(value: &str, card_gateways: &[&str]) -> Self {
    if value.eq_ignore_ascii_case("upi") {
      PaymentMethod::Upi
    } else if card_gateways.iter().any(|g| g.eq_ignore_ascii_case(value)) {
      PaymentMethod::Card {
        gateway: value.to_string(),
      }
    } else {
      PaymentMethod::Other { name: value.to_string() }
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      PaymentMethod::Upi => "UPI Payment",
      PaymentMethod::Card { .. } => "Card Payment",
      PaymentMethod::Other { .. } => "Online Payment",
    }
  }
}

/// An immutable copy of one cart line taken at order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
  pub product_id: String,
  pub name: String,
  pub unit_price: Money,
  pub quantity: u32,
  pub line_total: Money,
}

impl From<&CartLine> for OrderLine {
  fn from(line: &CartLine) -> Self {
    Self {
      product_id: line.product_id.clone(),
      name: line.name.clone(),
      unit_price: line.unit_price,
      quantity: line.quantity,
      line_total: line.line_total(),
    }
  }
}

/// Caller-supplied fields stored on the order header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
  #[serde(default)]
  pub notes: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub pincode: Option<String>,
  /// Client user agent.
  #[serde(default)]
  pub device: Option<String>,
}

impl OrderDetails {
  pub fn validate(&self) -> StoreResult<()> {
    if let Some(pincode) = self.pincode.as_deref() {
      validate_pincode(pincode)?;
    }
    Ok(())
  }
}

/// Indian postal codes are exactly six ASCII digits.
pub fn validate_pincode(pincode: &str) -> StoreResult<()> {
  if pincode.len() == 6 && pincode.bytes().all(|b| b.is_ascii_digit()) {
    Ok(())
  } else {
    Err(StoreError::validation(format!("pincode '{}' must be 6 digits", pincode)))
  }
}

/// An order ready to be written, with its id and totals already fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
  pub order_id: String,
  pub user_id: Option<UserId>,
  pub lines: Vec<OrderLine>,
  pub subtotal: Money,
  pub tax: Money,
  pub total: Money,
  pub payment_method: PaymentMethod,
  pub payment_reference: Option<String>,
  pub status: OrderStatus,
  pub details: OrderDetails,
  pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub order_id: String,
  pub user_id: Option<UserId>,
  pub lines: Vec<OrderLine>,
  pub subtotal: Money,
  pub tax: Money,
  pub total: Money,
  pub payment_method: PaymentMethod,
  pub payment_reference: Option<String>,
  pub status: OrderStatus,
  #[serde(flatten)]
  pub details: OrderDetails,
  pub date: NaiveDate,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  pub fn from_new(new_order: NewOrder, now: DateTime<Utc>) -> Self {
    Self {
      order_id: new_order.order_id,
      user_id: new_order.user_id,
      lines: new_order.lines,
      subtotal: new_order.subtotal,
      tax: new_order.tax,
      total: new_order.total,
      payment_method: new_order.payment_method,
      payment_reference: new_order.payment_reference,
      status: new_order.status,
      details: new_order.details,
      date: new_order.date,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn is_owned_by(&self, user_id: &UserId) -> bool {
    self.user_id.as_ref() == Some(user_id)
  }
}

/// The terminal outcome `finalize` records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalization {
  pub status: OrderStatus,
  pub payment_reference: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn paid_is_final() {
    assert!(OrderStatus::PendingPayment.can_transition_to(OrderStatus::Paid));
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PendingPayment));
    assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Failed));
    assert!(!OrderStatus::Failed.can_transition_to(OrderStatus::Paid));
    assert!(!OrderStatus::PendingPayment.can_transition_to(OrderStatus::Pending));
  }

  #[test]
  fn status_round_trips_through_its_column_value() {
    for status in [
      OrderStatus::Pending,
      OrderStatus::PendingPayment,
      OrderStatus::Paid,
      OrderStatus::Failed,
      OrderStatus::Cancelled,
    ] {
      assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
    }
    assert!("paid".parse::<OrderStatus>().is_err());
  }

  #[test]
  fn pincode_must_be_six_digits() {
    assert!(validate_pincode("110001").is_ok());
    assert!(validate_pincode("11001").is_err());
    assert!(validate_pincode("11000a").is_err());
    assert!(validate_pincode("1100011").is_err());
  }

  #[test]
  fn payment_method_labels() {
    assert_eq!(PaymentMethod::from_stored("UPI", &["Razorpay"]).label(), "UPI Payment");
    assert_eq!(PaymentMethod::from_stored("Razorpay", &["Razorpay"]).label(), "Card Payment");
    assert_eq!(PaymentMethod::from_stored("COD", &["Razorpay"]).label(), "Online Payment");
  }
}
