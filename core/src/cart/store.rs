// storefront-core/src/cart/store.rs

use super::storage::CartBackends;
use super::{Cart, CartLine, ProductRef};
use crate::error::{StoreError, StoreResult};
use crate::identity::{CartOwner, Identity};
use tracing::{debug, info, instrument};

/// What happens to a device cart when its caller signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandoffPolicy {
  /// Fold device lines into the user's remote cart, summing quantities.
  #[default]
  Merge,
  /// Drop the device cart and take the remote cart as-is.
  Discard,
}

/// A cart bound to one owner.
///
/// Device carts are mutated locally and the full snapshot is written back on
/// every change. User carts are mutated remotely and reloaded after every
/// change, so the view always matches what the server holds.
pub struct CartStore {
  owner: CartOwner,
  cart: Cart,
  backends: CartBackends,
}

impl CartStore {
  /// Loads the cart for `identity` from the matching backend.
  pub async fn open(identity: &Identity, backends: CartBackends) -> StoreResult<Self> {
    let owner = identity.cart_owner()?;
    let cart = load(&owner, &backends).await?;
    Ok(Self { owner, cart, backends })
  }

  pub fn owner(&self) -> &CartOwner {
    &self.owner
  }

  pub fn cart(&self) -> &Cart {
    &self.cart
  }

  pub fn snapshot(&self) -> Vec<CartLine> {
    self.cart.snapshot()
  }

  #[instrument(name = "CartStore::add", skip(self, product), fields(product_id = %product.id))]
  pub async fn add(&mut self, product: ProductRef, quantity: u32) -> StoreResult<()> {
    match &self.owner {
      CartOwner::Device(device_id) => {
        self.cart.add(product, quantity)?;
        self.backends.device.save(device_id, &self.cart).await
      }
      CartOwner::User(user_id) => {
        // Validate before touching the remote side.
        Cart::new().add(product.clone(), quantity)?;
        self.backends.remote.add_line(user_id, &product, quantity).await?;
        self.reload().await
      }
    }
  }

  #[instrument(name = "CartStore::set_quantity", skip(self))]
  pub async fn set_quantity(&mut self, product_id: &str, quantity: i64) -> StoreResult<()> {
    if quantity <= 0 {
      return self.remove(product_id).await;
    }
    match &self.owner {
      CartOwner::Device(device_id) => {
        if self.cart.set_quantity(product_id, quantity)? {
          self.backends.device.save(device_id, &self.cart).await?;
        }
        Ok(())
      }
      CartOwner::User(user_id) => {
        let quantity = u32::try_from(quantity)
          .map_err(|_| StoreError::validation(format!("quantity {} is too large", quantity)))?;
        self.backends.remote.set_quantity(user_id, product_id, quantity).await?;
        self.reload().await
      }
    }
  }

  /// Removing a product that is not in the cart is a no-op.
  #[instrument(name = "CartStore::remove", skip(self))]
  pub async fn remove(&mut self, product_id: &str) -> StoreResult<()> {
    match &self.owner {
      CartOwner::Device(device_id) => {
        if self.cart.remove(product_id).is_some() {
          self.backends.device.save(device_id, &self.cart).await?;
        }
        Ok(())
      }
      CartOwner::User(user_id) => {
        self.backends.remote.remove(user_id, product_id).await?;
        self.reload().await
      }
    }
  }

  #[instrument(name = "CartStore::clear", skip(self))]
  pub async fn clear(&mut self) -> StoreResult<()> {
    match &self.owner {
      CartOwner::Device(device_id) => {
        self.cart.clear();
        self.backends.device.discard(device_id).await
      }
      CartOwner::User(user_id) => {
        self.backends.remote.clear(user_id).await?;
        self.reload().await
      }
    }
  }

  /// Replaces the local view with what the owner's backend holds.
  pub async fn reload(&mut self) -> StoreResult<()> {
    self.cart = load(&self.owner, &self.backends).await?;
    Ok(())
  }

  /// Rebinds the store to `identity`.
  ///
  /// Going from a device to a user applies `policy` to the device cart and
  /// then discards it; any other change just loads the new owner's cart.
  #[instrument(name = "CartStore::switch_identity", skip(self, identity), fields(policy = ?policy))]
  pub async fn switch_identity(&mut self, identity: &Identity, policy: HandoffPolicy) -> StoreResult<()> {
    let next = identity.cart_owner()?;
    if next == self.owner {
      return self.reload().await;
    }

    if let (CartOwner::Device(device_id), CartOwner::User(user_id)) = (&self.owner, &next) {
      let device_cart = self.backends.device.load(device_id).await?;
      if policy == HandoffPolicy::Merge && !device_cart.is_empty() {
        info!(lines = device_cart.len(), user_id = %user_id, "Merging device cart into user cart.");
        for line in device_cart.lines() {
          self.backends.remote.add_line(user_id, &line.product(), line.quantity).await?;
        }
      } else {
        debug!(lines = device_cart.len(), "Discarding device cart on sign-in.");
      }
      self.backends.device.discard(device_id).await?;
    }

    self.owner = next;
    self.reload().await
  }
}

async fn load(owner: &CartOwner, backends: &CartBackends) -> StoreResult<Cart> {
  match owner {
    CartOwner::Device(device_id) => backends.device.load(device_id).await,
    CartOwner::User(user_id) => backends.remote.fetch(user_id).await,
  }
}
