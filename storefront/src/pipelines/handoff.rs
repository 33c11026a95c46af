// storefront/src/pipelines/handoff.rs

//! Sign-in cart handoff: folds an anonymous device cart into the user's cart.

use storefront_core::cart::{Cart, CartBackends, CartStore, HandoffPolicy};
use storefront_core::flow::skip_when;
use storefront_core::identity::Identity;
use storefront_core::{ContextData, Pipeline, PipelineControl, StoreError, StoreResult};
use tracing::{info, instrument};

pub struct CartHandoffCtx {
  pub identity: Identity,
  pub device_id: Option<String>,
  /// Device lines seen before the handoff.
  pub device_lines: usize,
  pub cart: Option<Cart>,
}

impl CartHandoffCtx {
  pub fn new(identity: Identity, device_id: Option<String>) -> Self {
    Self {
      identity,
      device_id: device_id.filter(|d| !d.trim().is_empty()),
      device_lines: 0,
      cart: None,
    }
  }
}

pub fn cart_handoff_pipeline(carts: CartBackends, policy: HandoffPolicy) -> Pipeline<CartHandoffCtx, StoreError> {
  let mut p = Pipeline::<CartHandoffCtx, StoreError>::new(&[
    ("require_user", false, None),
    ("fold_device_cart", false, skip_when(|c: &CartHandoffCtx| c.device_id.is_none())),
    ("load_user_cart", false, skip_when(|c: &CartHandoffCtx| c.cart.is_some())),
  ]);

  p.on("require_user", |ctx: ContextData<CartHandoffCtx>| async move {
    ctx.with(|c| c.identity.require_user().map(|_| ()))?;
    Ok::<_, StoreError>(PipelineControl::Continue)
  });

  let backends = carts.clone();
  p.on("fold_device_cart", move |ctx| fold_device_cart(ctx, backends.clone(), policy));

  p.on("load_user_cart", move |ctx: ContextData<CartHandoffCtx>| {
    let backends = carts.clone();
    async move {
      let identity = ctx.with(|c| c.identity.clone());
      let store = CartStore::open(&identity, backends).await?;
      ctx.update(|c| c.cart = Some(store.cart().clone()));
      Ok::<_, StoreError>(PipelineControl::Continue)
    }
  });
  p
}

#[instrument(name = "handoff::fold_device_cart", skip_all, fields(policy = ?policy))]
async fn fold_device_cart(
  ctx: ContextData<CartHandoffCtx>,
  carts: CartBackends,
  policy: HandoffPolicy,
) -> StoreResult<PipelineControl> {
  let (identity, device_id) = ctx.with(|c| (c.identity.clone(), c.device_id.clone()));
  let mut store = CartStore::open(&Identity::anonymous(device_id), carts).await?;
  let device_lines = store.cart().len();
  store.switch_identity(&identity, policy).await?;
  info!(device_lines, user_lines = store.cart().len(), "Device cart handed off.");
  ctx.update(|c| {
    c.device_lines = device_lines;
    c.cart = Some(store.cart().clone());
  });
  Ok(PipelineControl::Continue)
}
