// storefront-core/src/receipt.rs

//! Receipts derived from an order and its line snapshot.
//!
//! Amounts are always recomputed from the lines. The order's stored totals are
//! only compared against, never copied.

use crate::money::{Money, GST_RATE_PERCENT};
use crate::order::{Order, OrderLine, PaymentMethod};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Write;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptIssuer {
  pub name: String,
  pub address_lines: Vec<String>,
  pub gstin: Option<String>,
  pub currency_symbol: String,
}

impl Default for ReceiptIssuer {
  fn default() -> Self {
    Self {
      name: "Storefront".to_string(),
      address_lines: Vec::new(),
      gstin: None,
      currency_symbol: "₹".to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
  pub name: String,
  pub quantity: u32,
  pub unit_price: Money,
  pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
  pub issuer: ReceiptIssuer,
  pub invoice_number: String,
  pub date: NaiveDate,
  pub order_id: String,
  pub transaction_id: Option<String>,
  pub lines: Vec<ReceiptLine>,
  pub subtotal: Money,
  pub tax: Money,
  pub shipping: Money,
  pub total: Money,
  pub payment_method: String,
  pub status: String,
}

impl Receipt {
  pub fn render(order: &Order, snapshot: &[OrderLine], method: &PaymentMethod) -> Receipt {
    let lines: Vec<ReceiptLine> = snapshot
      .iter()
      .map(|l| ReceiptLine {
        name: l.name.clone(),
        quantity: l.quantity,
        unit_price: l.unit_price,
        line_total: l.unit_price.times(l.quantity),
      })
      .collect();
    let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
    let tax = subtotal.gst();
    let shipping = Money::ZERO;
    let total = subtotal + tax + shipping;

    if total != order.total {
      warn!(
        order_id = %order.order_id,
        stored_total = %order.total,
        recomputed_total = %total,
        "Order total differs from its line snapshot; receipt uses the snapshot."
      );
    }

    Receipt {
      issuer: ReceiptIssuer::default(),
      invoice_number: order.order_id.clone(),
      date: order.date,
      order_id: order.order_id.clone(),
      transaction_id: order.payment_reference.clone(),
      lines,
      subtotal,
      tax,
      shipping,
      total,
      payment_method: method.label().to_string(),
      status: order.status.label().to_string(),
    }
  }

  pub fn with_issuer(mut self, issuer: ReceiptIssuer) -> Self {
    self.issuer = issuer;
    self
  }

  pub fn file_name(&self) -> String {
    format!("Receipt_{}.txt", self.order_id)
  }

  /// The downloadable plain-text form.
  pub fn to_text(&self) -> String {
    let cur = &self.issuer.currency_symbol;
    let heading = format!("{} - PAYMENT RECEIPT", self.issuer.name.to_uppercase());
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}", heading);
    let _ = writeln!(out, "{}", "=".repeat(heading.chars().count()));
    for line in &self.issuer.address_lines {
      let _ = writeln!(out, "{}", line);
    }
    let _ = writeln!(out, "Invoice: {}", self.invoice_number);
    let _ = writeln!(out, "Date: {}", self.date.format("%d/%m/%Y"));
    let _ = writeln!(out, "Order ID: {}", self.order_id);
    let _ = writeln!(out, "Transaction ID: {}", self.transaction_id.as_deref().unwrap_or("-"));
    let _ = writeln!(out);
    let _ = writeln!(out, "Items:");
    for line in &self.lines {
      let _ = writeln!(
        out,
        "{} x{} @ {}{} - {}{}",
        line.name, line.quantity, cur, line.unit_price, cur, line.line_total
      );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Subtotal: {}{}", cur, self.subtotal);
    let _ = writeln!(out, "GST ({}%): {}{}", GST_RATE_PERCENT, cur, self.tax);
    let _ = writeln!(out, "Shipping: {}{}", cur, self.shipping);
    let _ = writeln!(out, "Total: {}{}", cur, self.total);
    let _ = writeln!(out);
    let _ = writeln!(out, "Payment Method: {}", self.payment_method);
    let _ = writeln!(out, "Status: {}", self.status);
    if let Some(gstin) = &self.issuer.gstin {
      let _ = writeln!(out, "GSTIN: {}", gstin);
    }
    out
  }
}
