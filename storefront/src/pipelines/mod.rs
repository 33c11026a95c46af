// storefront/src/pipelines/mod.rs

//! Registers every flow the HTTP layer runs.

use crate::errors::AppError;
use std::sync::Arc;
use storefront_core::cart::HandoffPolicy;
use storefront_core::checkout::{register_checkout_flows, CheckoutServices};
use storefront_core::FlowRegistry;

pub mod handoff;

pub use handoff::CartHandoffCtx;

/// Called once at startup.
pub fn register_all_pipelines(registry: &FlowRegistry<AppError>, services: Arc<CheckoutServices>, handoff: HandoffPolicy) {
  tracing::info!("Registering flows...");
  registry.register(handoff::cart_handoff_pipeline(services.carts.clone(), handoff));
  register_checkout_flows(registry, services);
  tracing::info!("All application flows registered.");
}
