// storefront-core/src/cart/storage.rs

use super::{Cart, ProductRef};
use crate::error::StoreResult;
use crate::identity::UserId;
use async_trait::async_trait;
use std::sync::Arc;

/// Device-local cart snapshots for anonymous callers.
#[async_trait]
pub trait DeviceCartStorage: Send + Sync {
  /// An unknown device has an empty cart.
  async fn load(&self, device_id: &str) -> StoreResult<Cart>;

  /// Replaces the stored snapshot with `cart`.
  async fn save(&self, device_id: &str, cart: &Cart) -> StoreResult<()>;

  async fn discard(&self, device_id: &str) -> StoreResult<()>;
}

/// Server-side cart rows keyed by `(user_id, product_id)`.
#[async_trait]
pub trait RemoteCartRepository: Send + Sync {
  async fn fetch(&self, user_id: &UserId) -> StoreResult<Cart>;

  /// Upsert: inserts the line or adds `quantity` to the existing one.
  async fn add_line(&self, user_id: &UserId, product: &ProductRef, quantity: u32) -> StoreResult<()>;

  /// Overwrites the quantity of an existing line. `quantity` is at least 1.
  async fn set_quantity(&self, user_id: &UserId, product_id: &str, quantity: u32) -> StoreResult<()>;

  async fn remove(&self, user_id: &UserId, product_id: &str) -> StoreResult<()>;

  async fn clear(&self, user_id: &UserId) -> StoreResult<()>;
}

/// Both cart backends, shared across requests.
#[derive(Clone)]
pub struct CartBackends {
  pub device: Arc<dyn DeviceCartStorage>,
  pub remote: Arc<dyn RemoteCartRepository>,
}

impl CartBackends {
  pub fn new(device: Arc<dyn DeviceCartStorage>, remote: Arc<dyn RemoteCartRepository>) -> Self {
    Self { device, remote }
  }
}
