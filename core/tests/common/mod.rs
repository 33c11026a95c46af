// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storefront_core::cart::{CartBackends, CartStore, MemoryDeviceCarts, MemoryRemoteCarts, ProductRef};
use storefront_core::checkout::{
  register_checkout_flows, AnonymousCheckoutPolicy, CheckoutGuard, CheckoutPolicy, CheckoutServices, MemorySettlements,
};
use storefront_core::gateway::{GatewayOrder, GatewayOrderRequest, PaymentGateway};
use storefront_core::identity::{Identity, UserProfile};
use storefront_core::ledger::{LedgerConfig, MemoryOrderStore, OrderLedger, OrderStore};
use storefront_core::order::{Finalization, NewOrder, Order, OrderLine};
use storefront_core::signature::{compute_signature, SignatureVerifier};
use storefront_core::{FlowError, FlowRegistry, LedgerError, Money, StoreError, StoreResult};
use tracing::Level;

pub const KEY_ID: &str = "rzp_test_key";
pub const SECRET: &str = "s3cret";
pub const MERCHANT_VPA: &str = "shop@ibl";

// --- Tracing ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Flow engine fixtures ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub steps_executed: Vec<String>,
  pub should_stop_at: Option<String>,
  pub skip_second: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Flow error: {0}")]
  Flow(String),

  #[error("Test handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(fe: FlowError) -> Self {
    TestError::Flow(format!("{:?}", fe))
  }
}

pub fn recording_handler(step_name: &'static str) -> storefront_core::flow::Handler<TestContext, TestError> {
  Box::new(move |ctx| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.steps_executed.push(step_name.to_string());
      if guard.should_stop_at.as_deref() == Some(step_name) {
        return Ok(storefront_core::PipelineControl::Stop);
      }
      Ok(storefront_core::PipelineControl::Continue)
    })
  })
}

pub fn failing_handler(step_name: &'static str, message: &'static str) -> storefront_core::flow::Handler<TestContext, TestError> {
  Box::new(move |ctx| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      Err(TestError::Handler(message.to_string()))
    })
  })
}

// --- Identities and products ---
pub fn user(id: &str) -> Identity {
  Identity::Authenticated(UserProfile {
    user_id: storefront_core::identity::UserId::new(id),
    name: Some(format!("User {}", id)),
    email: Some(format!("{}@example.com", id)),
    phone: Some("9999999999".to_string()),
  })
}

pub fn device(id: &str) -> Identity {
  Identity::anonymous(Some(id.to_string()))
}

pub fn product(id: &str, major: i64) -> ProductRef {
  ProductRef {
    id: id.to_string(),
    name: format!("Product {}", id),
    unit_price: Money::from_major(major),
    category: Some("apparel".to_string()),
    image: None,
  }
}

// --- Scripted gateway ---
#[derive(Default)]
pub struct ScriptedGateway {
  pub key: Option<String>,
  pub fail_create: Mutex<Option<(String, Option<String>)>>,
  pub create_delay: Mutex<Duration>,
  pub requests: Mutex<Vec<GatewayOrderRequest>>,
  pub orders: Mutex<HashMap<String, GatewayOrder>>,
  counter: AtomicUsize,
}

impl ScriptedGateway {
  pub fn new(key: Option<&str>) -> Self {
    Self {
      key: key.map(str::to_string),
      ..Default::default()
    }
  }

  pub fn fail_next_create(&self, message: &str, details: Option<&str>) {
    *self.fail_create.lock() = Some((message.to_string(), details.map(str::to_string)));
  }

  pub fn delay_create(&self, delay: Duration) {
    *self.create_delay.lock() = delay;
  }

  pub fn create_calls(&self) -> usize {
    self.requests.lock().len()
  }

  pub fn tamper_amount(&self, gateway_order_id: &str, amount: Money) {
    if let Some(order) = self.orders.lock().get_mut(gateway_order_id) {
      order.amount = amount;
    }
  }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
  fn name(&self) -> &str {
    "Razorpay"
  }

  fn public_key(&self) -> Option<&str> {
    self.key.as_deref()
  }

  async fn create_order(&self, request: &GatewayOrderRequest) -> StoreResult<GatewayOrder> {
    self.requests.lock().push(request.clone());
    let delay = *self.create_delay.lock();
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    if let Some((message, details)) = self.fail_create.lock().take() {
      return Err(StoreError::Gateway { message, details });
    }
    let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
    let order = GatewayOrder {
      id: format!("order_{}", n),
      amount: request.amount,
      currency: request.currency.clone(),
      receipt: Some(request.receipt.clone()),
      status: Some("created".to_string()),
      extra: serde_json::Map::new(),
    };
    self.orders.lock().insert(order.id.clone(), order.clone());
    Ok(order)
  }

  async fn fetch_order(&self, gateway_order_id: &str) -> StoreResult<GatewayOrder> {
    self
      .orders
      .lock()
      .get(gateway_order_id)
      .cloned()
      .ok_or_else(|| StoreError::Gateway {
        message: format!("order {} not found", gateway_order_id),
        details: None,
      })
  }
}

// --- Order stores with injected failures ---
#[derive(Default)]
pub struct FlakyOrderStore {
  pub inner: MemoryOrderStore,
  pub fail_lines: AtomicBool,
  pub fail_finalize: AtomicBool,
}

#[async_trait]
impl OrderStore for FlakyOrderStore {
  async fn order_id_exists(&self, order_id: &str) -> Result<bool, LedgerError> {
    self.inner.order_id_exists(order_id).await
  }

  async fn insert_header(&self, order: &NewOrder) -> Result<Order, LedgerError> {
    self.inner.insert_header(order).await
  }

  async fn insert_lines(&self, order_id: &str, lines: &[OrderLine]) -> Result<(), LedgerError> {
    if self.fail_lines.load(Ordering::SeqCst) {
      return Err(LedgerError::Backend(anyhow::anyhow!("order_items insert failed")));
    }
    self.inner.insert_lines(order_id, lines).await
  }

  async fn delete_header(&self, order_id: &str) -> Result<(), LedgerError> {
    self.inner.delete_header(order_id).await
  }

  async fn find(&self, order_id: &str) -> Result<Option<Order>, LedgerError> {
    self.inner.find(order_id).await
  }

  async fn transition_open(
    &self,
    order_id: &str,
    finalization: &Finalization,
    at: DateTime<Utc>,
  ) -> Result<Option<Order>, LedgerError> {
    if self.fail_finalize.load(Ordering::SeqCst) {
      return Err(LedgerError::Backend(anyhow::anyhow!("connection reset")));
    }
    self.inner.transition_open(order_id, finalization, at).await
  }
}

// --- A whole shop wired with in-memory backends ---
pub struct ShopOptions {
  pub key: Option<&'static str>,
  pub secret: Option<&'static str>,
  pub anonymous: AnonymousCheckoutPolicy,
  pub merchant_upi_id: Option<&'static str>,
  pub timeout: Duration,
}

impl Default for ShopOptions {
  fn default() -> Self {
    Self {
      key: Some(KEY_ID),
      secret: Some(SECRET),
      anonymous: AnonymousCheckoutPolicy::Reject,
      merchant_upi_id: Some(MERCHANT_VPA),
      timeout: Duration::from_secs(5),
    }
  }
}

pub struct Shop {
  pub services: Arc<CheckoutServices>,
  pub orders: Arc<FlakyOrderStore>,
  pub device_carts: Arc<MemoryDeviceCarts>,
  pub remote_carts: Arc<MemoryRemoteCarts>,
  pub settlements: Arc<MemorySettlements>,
  pub gateway: Arc<ScriptedGateway>,
  pub registry: FlowRegistry<StoreError>,
}

impl Shop {
  pub fn new() -> Self {
    Self::with_options(ShopOptions::default())
  }

  pub fn with_options(options: ShopOptions) -> Self {
    let orders = Arc::new(FlakyOrderStore::default());
    let device_carts = Arc::new(MemoryDeviceCarts::new());
    let remote_carts = Arc::new(MemoryRemoteCarts::new());
    let settlements = Arc::new(MemorySettlements::new());
    let gateway = Arc::new(ScriptedGateway::new(options.key));

    let services = Arc::new(CheckoutServices {
      ledger: Arc::new(OrderLedger::new(orders.clone(), LedgerConfig::default())),
      gateway: gateway.clone(),
      verifier: SignatureVerifier::new(options.secret.map(str::to_string)),
      settlements: settlements.clone(),
      carts: CartBackends::new(device_carts.clone(), remote_carts.clone()),
      guard: CheckoutGuard::new(),
      policy: CheckoutPolicy {
        anonymous: options.anonymous,
        merchant_upi_id: options.merchant_upi_id.map(str::to_string),
        merchant_name: "Chads Store".to_string(),
        external_call_timeout: options.timeout,
        ..CheckoutPolicy::default()
      },
    });

    let registry = FlowRegistry::<StoreError>::new();
    register_checkout_flows(&registry, services.clone());

    Self {
      services,
      orders,
      device_carts,
      remote_carts,
      settlements,
      gateway,
      registry,
    }
  }

  pub fn carts(&self) -> CartBackends {
    self.services.carts.clone()
  }

  pub async fn fill_cart(&self, identity: &Identity, items: &[(&str, i64, u32)]) {
    let mut store = CartStore::open(identity, self.carts()).await.unwrap();
    for (id, major, qty) in items {
      store.add(product(id, *major), *qty).await.unwrap();
    }
  }

  pub async fn cart_total_items(&self, identity: &Identity) -> u64 {
    CartStore::open(identity, self.carts()).await.unwrap().cart().total_items()
  }

  pub async fn order(&self, order_id: &str) -> Order {
    self.orders.find(order_id).await.unwrap().expect("order exists")
  }
}

pub fn sign(gateway_order_id: &str, payment_id: &str) -> String {
  compute_signature(gateway_order_id, payment_id, SECRET).unwrap()
}
