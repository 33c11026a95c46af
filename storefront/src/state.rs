// storefront/src/state.rs

use crate::config::AppConfig;
use crate::db::{PgDeviceCarts, PgOrderStore, PgRemoteCarts, PgSettlements, SettlementRecorder};
use crate::errors::AppError;
use crate::pipelines::register_all_pipelines;
use crate::services::razorpay::GATEWAY_NAME;
use crate::services::{JwtSessionResolver, LocationLookup, RazorpayClient};
use sqlx::PgPool;
use std::sync::Arc;
use storefront_core::cart::CartBackends;
use storefront_core::checkout::{CheckoutGuard, CheckoutPolicy, CheckoutServices, SettlementCheck};
use storefront_core::gateway::PaymentGateway;
use storefront_core::identity::SessionResolver;
use storefront_core::ledger::{LedgerConfig, OrderLedger, OrderStore};
use storefront_core::receipt::ReceiptIssuer;
use storefront_core::signature::SignatureVerifier;
use storefront_core::FlowRegistry;

#[derive(Clone)]
pub struct AppState {
  pub db_pool: PgPool,
  pub registry: Arc<FlowRegistry<AppError>>,
  pub services: Arc<CheckoutServices>,
  pub sessions: Arc<dyn SessionResolver>,
  pub settlements: Arc<dyn SettlementRecorder>,
  pub location: LocationLookup,
  pub config: Arc<AppConfig>,
}

/// Backends the state is assembled from. Production wires Postgres and
/// Razorpay; handler tests wire the in-memory ones.
pub struct Backends {
  pub orders: Arc<dyn OrderStore>,
  pub carts: CartBackends,
  pub gateway: Arc<dyn PaymentGateway>,
  pub settlement_check: Arc<dyn SettlementCheck>,
  pub settlement_recorder: Arc<dyn SettlementRecorder>,
  pub sessions: Arc<dyn SessionResolver>,
}

impl Backends {
  pub fn postgres(config: &AppConfig, pool: &PgPool) -> Self {
    let settlements = Arc::new(PgSettlements::new(pool.clone()));
    Self {
      orders: Arc::new(PgOrderStore::new(pool.clone(), vec![GATEWAY_NAME.to_string()])),
      carts: CartBackends::new(
        Arc::new(PgDeviceCarts::new(pool.clone())),
        Arc::new(PgRemoteCarts::new(pool.clone())),
      ),
      gateway: Arc::new(RazorpayClient::new(
        config.razorpay_api_base.clone(),
        config.razorpay_key_id.clone(),
        config.razorpay_key_secret.clone(),
        config.external_call_timeout,
      )),
      settlement_check: settlements.clone(),
      settlement_recorder: settlements,
      sessions: Arc::new(JwtSessionResolver::new(&config.auth_jwt_secret)),
    }
  }
}

pub fn checkout_policy(config: &AppConfig) -> CheckoutPolicy {
  CheckoutPolicy {
    anonymous: config.anonymous_checkout,
    currency: config.store_currency.clone(),
    merchant_name: config.merchant_name.clone(),
    description: format!("{} order", config.merchant_name),
    theme_color: config.checkout_theme_color.clone(),
    merchant_upi_id: config.merchant_upi_id.clone(),
    external_call_timeout: config.external_call_timeout,
    issuer: ReceiptIssuer {
      name: config.merchant_name.clone(),
      ..ReceiptIssuer::default()
    },
  }
}

impl AppState {
  pub fn new(config: Arc<AppConfig>, db_pool: PgPool, backends: Backends) -> Self {
    let ledger = OrderLedger::new(
      backends.orders,
      LedgerConfig {
        order_id_prefix: config.order_id_prefix.clone(),
        ..LedgerConfig::default()
      },
    );
    let services = Arc::new(CheckoutServices {
      ledger: Arc::new(ledger),
      gateway: backends.gateway,
      verifier: SignatureVerifier::new(config.razorpay_key_secret.clone()),
      settlements: backends.settlement_check,
      carts: backends.carts,
      guard: CheckoutGuard::new(),
      policy: checkout_policy(&config),
    });

    let registry = Arc::new(FlowRegistry::<AppError>::new());
    register_all_pipelines(&registry, services.clone(), config.cart_handoff);

    Self {
      db_pool,
      registry,
      services,
      sessions: backends.sessions,
      settlements: backends.settlement_recorder,
      location: LocationLookup::new(
        config.pincode_api_base_url.clone(),
        config.nominatim_base_url.clone(),
        config.external_call_timeout,
      ),
      config,
    }
  }
}
