// storefront-core/src/cart/mod.rs

//! The Cart Store: line items keyed by product id, and the totals checkout
//! charges from.

mod memory;
mod storage;
mod store;

pub use memory::{MemoryDeviceCarts, MemoryRemoteCarts};
pub use storage::{CartBackends, DeviceCartStorage, RemoteCartRepository};
pub use store::{CartStore, HandoffPolicy};

use crate::error::{StoreError, StoreResult};
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A product as it is put into a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
  pub id: String,
  pub name: String,
  pub unit_price: Money,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
  pub product_id: String,
  pub name: String,
  pub unit_price: Money,
  /// Always at least 1; a line that would drop to zero is removed instead.
  pub quantity: u32,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub image: Option<String>,
}

impl CartLine {
  pub fn new(product: ProductRef, quantity: u32) -> Self {
    Self {
      product_id: product.id,
      name: product.name,
      unit_price: product.unit_price,
      quantity,
      category: product.category,
      image: product.image,
    }
  }

  pub fn line_total(&self) -> Money {
    self.unit_price.times(self.quantity)
  }

  pub fn product(&self) -> ProductRef {
    ProductRef {
      id: self.product_id.clone(),
      name: self.name.clone(),
      unit_price: self.unit_price,
      category: self.category.clone(),
      image: self.image.clone(),
    }
  }
}

/// An unordered set of lines keyed by product id.
///
/// Totals are derived on every call and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct Cart {
  lines: BTreeMap<String, CartLine>,
}

impl From<Vec<CartLine>> for Cart {
  fn from(lines: Vec<CartLine>) -> Self {
    let mut cart = Cart::default();
    for line in lines.into_iter().filter(|l| l.quantity > 0) {
      cart.insert_or_increment(line);
    }
    cart
  }
}

impl From<Cart> for Vec<CartLine> {
  fn from(cart: Cart) -> Self {
    cart.lines.into_values().collect()
  }
}

impl Cart {
  pub fn new() -> Self {
    Self::default()
  }

  /// Increments the line for `product` by `quantity`, or appends a new line.
  pub fn add(&mut self, product: ProductRef, quantity: u32) -> StoreResult<()> {
    validate_product(&product)?;
    if quantity == 0 {
      return Err(StoreError::validation("quantity must be at least 1"));
    }
    self.insert_or_increment(CartLine::new(product, quantity));
    Ok(())
  }

  /// `quantity <= 0` removes the line; otherwise overwrites it. Returns whether
  /// a line with `product_id` existed.
  pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> StoreResult<bool> {
    if quantity <= 0 {
      return Ok(self.remove(product_id).is_some());
    }
    let quantity = u32::try_from(quantity)
      .map_err(|_| StoreError::validation(format!("quantity {} is too large", quantity)))?;
    Ok(match self.lines.get_mut(product_id) {
      Some(line) => {
        line.quantity = quantity;
        true
      }
      None => false,
    })
  }

  pub fn remove(&mut self, product_id: &str) -> Option<CartLine> {
    self.lines.remove(product_id)
  }

  pub fn clear(&mut self) {
    self.lines.clear();
  }

  pub fn get(&self, product_id: &str) -> Option<&CartLine> {
    self.lines.get(product_id)
  }

  pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
    self.lines.values()
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  pub fn len(&self) -> usize {
    self.lines.len()
  }

  pub fn subtotal(&self) -> Money {
    self.lines.values().map(CartLine::line_total).sum()
  }

  pub fn tax(&self) -> Money {
    self.subtotal().gst()
  }

  pub fn total(&self) -> Money {
    self.subtotal() + self.tax()
  }

  /// Sum of quantities across all lines.
  pub fn total_items(&self) -> u64 {
    self.lines.values().map(|l| u64::from(l.quantity)).sum()
  }

  /// An owned copy of the lines, detached from this cart.
  pub fn snapshot(&self) -> Vec<CartLine> {
    self.lines.values().cloned().collect()
  }

  /// Folds `other` into this cart, summing quantities on key collision.
  pub fn merge(&mut self, other: &Cart) {
    for line in other.lines.values() {
      self.insert_or_increment(line.clone());
    }
  }

  fn insert_or_increment(&mut self, line: CartLine) {
    match self.lines.get_mut(&line.product_id) {
      Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
      None => {
        self.lines.insert(line.product_id.clone(), line);
      }
    }
  }
}

fn validate_product(product: &ProductRef) -> StoreResult<()> {
  if product.id.trim().is_empty() {
    return Err(StoreError::validation("product id is required"));
  }
  if product.unit_price.is_negative() {
    return Err(StoreError::validation(format!(
      "unit price for '{}' must not be negative",
      product.id
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn product(id: &str, major: i64) -> ProductRef {
    ProductRef {
      id: id.to_string(),
      name: format!("Product {}", id),
      unit_price: Money::from_major(major),
      category: None,
      image: None,
    }
  }

  #[test]
  fn add_increments_existing_line() {
    let mut cart = Cart::new();
    cart.add(product("t1", 500), 1).unwrap();
    cart.add(product("t1", 500), 2).unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.get("t1").map(|l| l.quantity), Some(3));
    assert_eq!(cart.total_items(), 3);
  }

  #[test]
  fn totals_for_a_single_line() {
    let mut cart = Cart::new();
    cart.add(product("t1", 500), 2).unwrap();
    assert_eq!(cart.subtotal(), Money::from_major(1000));
    assert_eq!(cart.tax(), Money::from_major(180));
    assert_eq!(cart.total(), Money::from_major(1180));
  }

  #[test]
  fn set_quantity_zero_matches_remove() {
    let mut a = Cart::new();
    a.add(product("x", 10), 2).unwrap();
    a.add(product("y", 20), 1).unwrap();
    let mut b = a.clone();

    assert!(a.set_quantity("x", 0).unwrap());
    b.remove("x");
    assert_eq!(a, b);

    assert!(a.set_quantity("y", -4).unwrap());
    b.remove("y");
    assert_eq!(a, b);
  }

  #[test]
  fn oversized_quantity_is_rejected_and_line_kept() {
    let mut cart = Cart::new();
    cart.add(product("x", 10), 2).unwrap();

    let result = cart.set_quantity("x", i64::from(u32::MAX) + 1);
    assert!(matches!(result, Err(StoreError::Validation(_))));
    assert_eq!(cart.get("x").unwrap().quantity, 2);
  }

  #[test]
  fn zero_quantity_and_negative_prices_are_rejected() {
    let mut cart = Cart::new();
    assert!(matches!(cart.add(product("x", 10), 0), Err(StoreError::Validation(_))));
    assert!(matches!(cart.add(product("x", -1), 1), Err(StoreError::Validation(_))));
    assert!(cart.is_empty());
  }

  #[test]
  fn merge_sums_quantities() {
    let mut remote = Cart::new();
    remote.add(product("a", 10), 1).unwrap();
    let mut local = Cart::new();
    local.add(product("a", 10), 2).unwrap();
    local.add(product("b", 5), 1).unwrap();

    remote.merge(&local);
    assert_eq!(remote.get("a").map(|l| l.quantity), Some(3));
    assert_eq!(remote.get("b").map(|l| l.quantity), Some(1));
  }

  #[test]
  fn deserializing_drops_zero_quantity_lines() {
    let json = r#"[{"product_id":"a","name":"A","unit_price":100,"quantity":0}]"#;
    let cart: Cart = serde_json::from_str(json).unwrap();
    assert!(cart.is_empty());
  }
}
