// storefront/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use storefront_core::cart::{Cart, CartStore, ProductRef};
use storefront_core::checkout::with_timeout;
use storefront_core::{ContextData, PipelineResult};
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::CartHandoffCtx;
use crate::state::AppState;
use crate::web::extractors::Caller;

#[derive(Deserialize, Debug)]
pub struct AddToCartRequest {
  #[serde(flatten)]
  pub product: ProductRef,
  #[serde(default = "default_quantity")]
  pub quantity: u32,
}

fn default_quantity() -> u32 {
  1
}

#[derive(Deserialize, Debug)]
pub struct SetQuantityRequest {
  pub quantity: i64,
}

pub(crate) fn cart_view(cart: &Cart) -> serde_json::Value {
  json!({
    "items": cart.snapshot(),
    "subtotal": cart.subtotal(),
    "tax": cart.tax(),
    "total": cart.total(),
    "totalItems": cart.total_items(),
  })
}

async fn open_cart(app_state: &AppState, caller: &Caller) -> Result<CartStore, AppError> {
  let carts = app_state.services.carts.clone();
  let store = with_timeout(
    app_state.config.external_call_timeout,
    "cart load",
    CartStore::open(&caller.identity, carts),
  )
  .await?;
  Ok(store)
}

#[instrument(name = "handler::view_cart", skip(app_state, caller))]
pub async fn view_cart_handler(app_state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
  let store = open_cart(&app_state, &caller).await?;
  Ok(HttpResponse::Ok().json(cart_view(store.cart())))
}

#[instrument(
  name = "handler::add_to_cart",
  skip(app_state, caller, req_payload),
  fields(product_id = %req_payload.product.id, quantity = req_payload.quantity)
)]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  req_payload: web::Json<AddToCartRequest>,
) -> Result<HttpResponse, AppError> {
  let AddToCartRequest { product, quantity } = req_payload.into_inner();
  let mut store = open_cart(&app_state, &caller).await?;
  store.add(product, quantity).await?;
  info!(lines = store.cart().len(), "Item added to cart.");
  Ok(HttpResponse::Ok().json(cart_view(store.cart())))
}

/// A quantity of zero or less removes the line.
#[instrument(name = "handler::set_cart_quantity", skip(app_state, caller, req_payload), fields(quantity = req_payload.quantity))]
pub async fn set_quantity_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  path: web::Path<String>,
  req_payload: web::Json<SetQuantityRequest>,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  let mut store = open_cart(&app_state, &caller).await?;
  store.set_quantity(&product_id, req_payload.quantity).await?;
  Ok(HttpResponse::Ok().json(cart_view(store.cart())))
}

#[instrument(name = "handler::remove_from_cart", skip(app_state, caller))]
pub async fn remove_item_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  let mut store = open_cart(&app_state, &caller).await?;
  store.remove(&product_id).await?;
  Ok(HttpResponse::Ok().json(cart_view(store.cart())))
}

#[instrument(name = "handler::clear_cart", skip(app_state, caller))]
pub async fn clear_cart_handler(app_state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
  let mut store = open_cart(&app_state, &caller).await?;
  store.clear().await?;
  Ok(HttpResponse::Ok().json(cart_view(store.cart())))
}

/// Called right after sign-in with both the new bearer token and the old
/// device id, so the device cart can be folded into the user's cart.
#[instrument(name = "handler::cart_handoff", skip(app_state, caller))]
pub async fn cart_handoff_handler(app_state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
  let ctx = ContextData::new(CartHandoffCtx::new(caller.identity, caller.device_id));

  match app_state.registry.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let (cart, device_lines) = ctx.with(|c| (c.cart.clone(), c.device_lines));
      let cart = cart.ok_or_else(|| {
        warn!("Handoff completed without loading the user cart.");
        AppError::Internal("cart handoff finished without a cart".to_string())
      })?;
      let mut body = cart_view(&cart);
      body["mergedDeviceLines"] = json!(device_lines);
      Ok(HttpResponse::Ok().json(body))
    }
    Ok(PipelineResult::Stopped) => Err(AppError::Internal("cart handoff was halted".to_string())),
    Err(e) => Err(e),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::services::session::issue_test_token;
  use crate::state::testing::in_memory_state;
  use crate::config::AppConfig;
  use crate::web::configure_app_routes;
  use actix_web::{test, App};
  use serde_json::Value;

  fn add_body(id: &str, price_paise: i64, quantity: u32) -> Value {
    json!({ "id": id, "name": format!("Tee {}", id), "unit_price": price_paise, "quantity": quantity })
  }

  #[actix_web::test]
  async fn device_cart_add_update_remove() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/api/v1/cart/items")
      .insert_header(("X-Device-Id", "dev-1"))
      .set_json(add_body("t1", 50_000, 2))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["subtotal"], json!(100_000));
    assert_eq!(body["tax"], json!(18_000));
    assert_eq!(body["total"], json!(118_000));
    assert_eq!(body["totalItems"], json!(2));

    let req = test::TestRequest::put()
      .uri("/api/v1/cart/items/t1")
      .insert_header(("X-Device-Id", "dev-1"))
      .set_json(json!({ "quantity": 0 }))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["total"], json!(0));
  }

  #[actix_web::test]
  async fn anonymous_without_device_id_is_unauthorized() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::get().uri("/api/v1/cart").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
  }

  #[actix_web::test]
  async fn handoff_merges_device_cart_into_user_cart() {
    let config = AppConfig::for_tests();
    let token = issue_test_token(&config.auth_jwt_secret, "u1", 600);
    let (state, _) = in_memory_state(config);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    for (bearer, body) in [
      (None, add_body("t1", 50_000, 1)),
      (Some(token.clone()), add_body("t1", 50_000, 2)),
    ] {
      let mut req = test::TestRequest::post()
        .uri("/api/v1/cart/items")
        .insert_header(("X-Device-Id", "dev-9"))
        .set_json(body);
      if let Some(token) = bearer {
        req = req.insert_header(("Authorization", format!("Bearer {}", token)));
      }
      let resp = test::call_service(&app, req.to_request()).await;
      assert!(resp.status().is_success());
    }

    let req = test::TestRequest::post()
      .uri("/api/v1/cart/handoff")
      .insert_header(("X-Device-Id", "dev-9"))
      .insert_header(("Authorization", format!("Bearer {}", token)))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["totalItems"], json!(3));
    assert_eq!(body["mergedDeviceLines"], json!(1));

    let req = test::TestRequest::get()
      .uri("/api/v1/cart")
      .insert_header(("X-Device-Id", "dev-9"))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["items"], json!([]), "device cart is discarded after handoff");
  }

  #[actix_web::test]
  async fn malformed_authorization_header_is_rejected() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::get()
      .uri("/api/v1/cart")
      .insert_header(("Authorization", "Basic abc"))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
  }
}
