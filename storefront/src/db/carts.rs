// storefront/src/db/carts.rs

use super::storage_error;
use crate::models::CartItemRow;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use storefront_core::cart::{Cart, CartLine, DeviceCartStorage, ProductRef, RemoteCartRepository};
use storefront_core::identity::UserId;
use storefront_core::{StoreError, StoreResult};
use tracing::{instrument, warn};

/// `cart_items`, one row per `(user_id, product_id)`.
#[derive(Clone)]
pub struct PgRemoteCarts {
  pool: PgPool,
}

impl PgRemoteCarts {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

/// `cart_items.quantity` is an INT column.
fn to_i32(quantity: u32) -> StoreResult<i32> {
  i32::try_from(quantity).map_err(|_| StoreError::validation(format!("quantity {} is too large", quantity)))
}

#[async_trait]
impl RemoteCartRepository for PgRemoteCarts {
  async fn fetch(&self, user_id: &UserId) -> StoreResult<Cart> {
    let rows = sqlx::query_as::<_, CartItemRow>(
      "SELECT user_id, product_id, name, price, quantity, category, image, added_at \
       FROM cart_items WHERE user_id = $1 ORDER BY added_at",
    )
    .bind(user_id.as_str())
    .fetch_all(&self.pool)
    .await
    .map_err(storage_error)?;

    let lines: Vec<CartLine> = rows
      .into_iter()
      .filter_map(|row| {
        let product_id = row.product_id.clone();
        let line = row.into_line();
        if line.is_none() {
          warn!(user_id = %user_id, product_id = %product_id, "Skipping cart row without a positive quantity.");
        }
        line
      })
      .collect();
    Ok(Cart::from(lines))
  }

  #[instrument(name = "PgRemoteCarts::add_line", skip_all, fields(user_id = %user_id, product_id = %product.id, quantity))]
  async fn add_line(&self, user_id: &UserId, product: &ProductRef, quantity: u32) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO cart_items (user_id, product_id, name, price, quantity, category, image) \
       VALUES ($1, $2, $3, $4, $5, $6, $7) \
       ON CONFLICT (user_id, product_id) DO UPDATE SET \
         quantity = cart_items.quantity + EXCLUDED.quantity, \
         name = EXCLUDED.name, \
         price = EXCLUDED.price, \
         category = EXCLUDED.category, \
         image = EXCLUDED.image",
    )
    .bind(user_id.as_str())
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.unit_price.minor())
    .bind(to_i32(quantity)?)
    .bind(product.category.as_deref())
    .bind(product.image.as_deref())
    .execute(&self.pool)
    .await
    .map_err(storage_error)?;
    Ok(())
  }

  async fn set_quantity(&self, user_id: &UserId, product_id: &str, quantity: u32) -> StoreResult<()> {
    sqlx::query("UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2")
      .bind(user_id.as_str())
      .bind(product_id)
      .bind(to_i32(quantity)?)
      .execute(&self.pool)
      .await
      .map_err(storage_error)?;
    Ok(())
  }

  async fn remove(&self, user_id: &UserId, product_id: &str) -> StoreResult<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
      .bind(user_id.as_str())
      .bind(product_id)
      .execute(&self.pool)
      .await
      .map_err(storage_error)?;
    Ok(())
  }

  async fn clear(&self, user_id: &UserId) -> StoreResult<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
      .bind(user_id.as_str())
      .execute(&self.pool)
      .await
      .map_err(storage_error)?;
    Ok(())
  }
}

/// `device_carts`: a JSON snapshot per anonymous device.
#[derive(Clone)]
pub struct PgDeviceCarts {
  pool: PgPool,
}

impl PgDeviceCarts {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl DeviceCartStorage for PgDeviceCarts {
  async fn load(&self, device_id: &str) -> StoreResult<Cart> {
    let row: Option<(Json<Cart>,)> = sqlx::query_as("SELECT items FROM device_carts WHERE device_id = $1")
      .bind(device_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(storage_error)?;
    Ok(row.map(|(items,)| items.0).unwrap_or_default())
  }

  async fn save(&self, device_id: &str, cart: &Cart) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO device_carts (device_id, items, updated_at) VALUES ($1, $2, now()) \
       ON CONFLICT (device_id) DO UPDATE SET items = EXCLUDED.items, updated_at = now()",
    )
    .bind(device_id)
    .bind(Json(cart))
    .execute(&self.pool)
    .await
    .map_err(storage_error)?;
    Ok(())
  }

  async fn discard(&self, device_id: &str) -> StoreResult<()> {
    sqlx::query("DELETE FROM device_carts WHERE device_id = $1")
      .bind(device_id)
      .execute(&self.pool)
      .await
      .map_err(storage_error)?;
    Ok(())
  }
}
