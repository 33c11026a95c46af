// storefront/src/models/cart_item.rs

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use storefront_core::cart::CartLine;
use storefront_core::Money;

#[derive(Debug, Clone, FromRow)]
pub struct CartItemRow {
  pub user_id: String,
  pub product_id: String,
  pub name: String,
  pub price: i64,
  pub quantity: i32,
  pub category: Option<String>,
  pub image: Option<String>,
  pub added_at: DateTime<Utc>,
}

impl CartItemRow {
  /// `None` for a row whose quantity is not positive; the table forbids it,
  /// but a line with no quantity has no place in a cart either way.
  pub fn into_line(self) -> Option<CartLine> {
    let quantity = u32::try_from(self.quantity).ok().filter(|q| *q > 0)?;
    Some(CartLine {
      product_id: self.product_id,
      name: self.name,
      unit_price: Money::from_minor(self.price),
      quantity,
      category: self.category,
      image: self.image,
    })
  }
}
