// storefront-core/src/cart/memory.rs

use super::storage::{DeviceCartStorage, RemoteCartRepository};
use super::{Cart, ProductRef};
use crate::error::StoreResult;
use crate::identity::UserId;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryDeviceCarts {
  carts: RwLock<HashMap<String, Cart>>,
}

impl MemoryDeviceCarts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, device_id: &str) -> bool {
    self.carts.read().contains_key(device_id)
  }
}

#[async_trait]
impl DeviceCartStorage for MemoryDeviceCarts {
  async fn load(&self, device_id: &str) -> StoreResult<Cart> {
    Ok(self.carts.read().get(device_id).cloned().unwrap_or_default())
  }

  async fn save(&self, device_id: &str, cart: &Cart) -> StoreResult<()> {
    self.carts.write().insert(device_id.to_string(), cart.clone());
    Ok(())
  }

  async fn discard(&self, device_id: &str) -> StoreResult<()> {
    self.carts.write().remove(device_id);
    Ok(())
  }
}

#[derive(Default)]
pub struct MemoryRemoteCarts {
  carts: RwLock<HashMap<UserId, Cart>>,
}

impl MemoryRemoteCarts {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl RemoteCartRepository for MemoryRemoteCarts {
  async fn fetch(&self, user_id: &UserId) -> StoreResult<Cart> {
    Ok(self.carts.read().get(user_id).cloned().unwrap_or_default())
  }

  async fn add_line(&self, user_id: &UserId, product: &ProductRef, quantity: u32) -> StoreResult<()> {
    let mut carts = self.carts.write();
    carts.entry(user_id.clone()).or_default().add(product.clone(), quantity)
  }

  async fn set_quantity(&self, user_id: &UserId, product_id: &str, quantity: u32) -> StoreResult<()> {
    if let Some(cart) = self.carts.write().get_mut(user_id) {
      cart.set_quantity(product_id, i64::from(quantity))?;
    }
    Ok(())
  }

  async fn remove(&self, user_id: &UserId, product_id: &str) -> StoreResult<()> {
    if let Some(cart) = self.carts.write().get_mut(user_id) {
      cart.remove(product_id);
    }
    Ok(())
  }

  async fn clear(&self, user_id: &UserId) -> StoreResult<()> {
    self.carts.write().remove(user_id);
    Ok(())
  }
}
