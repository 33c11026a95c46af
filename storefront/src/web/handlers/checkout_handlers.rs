// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use storefront_core::checkout::{CardCallbackCtx, CardCheckoutCtx, CardFlowState, UpiCheckoutCtx, UpiConfirmCtx};
use storefront_core::gateway::CallbackOutcome;
use storefront_core::order::OrderDetails;
use storefront_core::{ContextData, PipelineResult};
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::Caller;

#[derive(Deserialize, Debug, Default)]
pub struct CheckoutRequest {
  #[serde(flatten)]
  pub details: OrderDetails,
}

#[derive(Deserialize, Debug)]
pub struct CardCallbackRequest {
  /// Internal order id returned by the start call.
  #[serde(default)]
  pub order_id: Option<String>,
  #[serde(flatten)]
  pub outcome: CallbackOutcome,
}

/// Body details win over the request's User-Agent for the stored device.
fn order_details(req_payload: CheckoutRequest, caller: &Caller) -> OrderDetails {
  let mut details = req_payload.details;
  if details.device.is_none() {
    details.device = caller.user_agent.clone();
  }
  details
}

#[instrument(name = "handler::start_card_checkout", skip_all, fields(authenticated = caller.identity.is_authenticated()))]
pub async fn start_card_checkout_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  req_payload: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
  let details = order_details(req_payload.into_inner(), &caller);
  let ctx = ContextData::new(CardCheckoutCtx::new(caller.identity, details));

  match app_state.registry.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let (checkout, order_id, state) = ctx.with(|c| {
        (
          c.checkout.clone(),
          c.order.as_ref().map(|o| o.order_id.clone()),
          c.state,
        )
      });
      let checkout = checkout.ok_or_else(|| {
        warn!(state = %state, "Card checkout completed without hosted checkout options.");
        AppError::Internal("card checkout finished without a gateway order".to_string())
      })?;
      info!(order_id = order_id.as_deref().unwrap_or("-"), gateway_order_id = %checkout.order_id, "Hosted checkout ready.");
      Ok(HttpResponse::Ok().json(json!({
        "orderId": order_id,
        "state": state,
        "checkout": checkout,
      })))
    }
    Ok(PipelineResult::Stopped) => Err(AppError::Internal("card checkout was halted".to_string())),
    Err(e) => Err(e),
  }
}

#[instrument(
  name = "handler::card_callback",
  skip_all,
  fields(order_id = req_payload.order_id.as_deref().unwrap_or("-"))
)]
pub async fn card_callback_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  req_payload: web::Json<CardCallbackRequest>,
) -> Result<HttpResponse, AppError> {
  let CardCallbackRequest { order_id, outcome } = req_payload.into_inner();
  let ctx = ContextData::new(CardCallbackCtx::new(caller.identity, order_id.clone(), outcome));

  match app_state.registry.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let (order, payment_id, receipt) = ctx.with(|c| (c.order.clone(), c.payment_id.clone(), c.receipt.clone()));
      Ok(HttpResponse::Ok().json(json!({
        "status": "paid",
        "verified": true,
        "orderId": order_id,
        "paymentId": payment_id,
        "order": order,
        "receipt": receipt,
      })))
    }
    Ok(PipelineResult::Stopped) => {
      // Dismissed or failed in the hosted UI. Nothing was charged; the order
      // stays open and the cart is untouched so the user can retry.
      let state = ctx.with(|c| c.state);
      let status = match state {
        CardFlowState::PaymentCancelled => "cancelled",
        _ => "failed",
      };
      Ok(HttpResponse::Ok().json(json!({
        "status": status,
        "verified": false,
        "orderId": order_id,
        "state": state,
        "message": "Payment was not completed. Your cart has been kept so you can try again.",
      })))
    }
    Err(e) => Err(e),
  }
}

#[instrument(name = "handler::start_upi_checkout", skip_all)]
pub async fn start_upi_checkout_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  req_payload: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
  let details = order_details(req_payload.into_inner(), &caller);
  let ctx = ContextData::new(UpiCheckoutCtx::new(caller.identity, details));

  match app_state.registry.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let (order, target) = ctx.with(|c| (c.order.clone(), c.target.clone()));
      let (Some(order), Some(target)) = (order, target) else {
        return Err(AppError::Internal("UPI checkout finished without an order".to_string()));
      };
      Ok(HttpResponse::Created().json(json!({
        "orderId": order.order_id,
        "order": order,
        "payment": target,
      })))
    }
    Ok(PipelineResult::Stopped) => Err(AppError::Internal("UPI checkout was halted".to_string())),
    Err(e) => Err(e),
  }
}

/// "I have paid". Only a settlement seen server-side marks the order Paid;
/// until then the answer is 202 and the order stays pending.
#[instrument(name = "handler::confirm_upi_payment", skip(app_state, caller))]
pub async fn confirm_upi_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let ctx = ContextData::new(UpiConfirmCtx::new(caller.identity, order_id.clone()));

  match app_state.registry.run(ctx.clone()).await {
    Ok(PipelineResult::Completed) => {
      let (order, receipt) = ctx.with(|c| (c.order.clone(), c.receipt.clone()));
      Ok(HttpResponse::Ok().json(json!({
        "status": "paid",
        "orderId": order_id,
        "order": order,
        "receipt": receipt,
      })))
    }
    Ok(PipelineResult::Stopped) => Ok(HttpResponse::Accepted().json(json!({
      "status": "pending",
      "orderId": order_id,
      "message": "We have not received this payment yet. Your order will be confirmed once it arrives.",
    }))),
    Err(e) => Err(e),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::services::session::issue_test_token;
  use crate::state::testing::in_memory_state;
  use crate::web::configure_app_routes;
  use actix_web::http::StatusCode;
  use actix_web::{test, App};
  use serde_json::Value;
  use storefront_core::checkout::AnonymousCheckoutPolicy;
  use storefront_core::ledger::OrderStore;
  use storefront_core::order::OrderStatus;
  use storefront_core::Money;

  fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
  }

  #[actix_web::test]
  async fn upi_order_waits_for_settlement_then_is_paid() {
    let config = AppConfig::for_tests();
    let token = issue_test_token(&config.auth_jwt_secret, "u1", 600);
    let (state, backends) = in_memory_state(config);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/api/v1/cart/items")
      .insert_header(bearer(&token))
      .set_json(json!({ "id": "t1", "name": "Tee", "unit_price": 50_000, "quantity": 2 }))
      .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::post()
      .uri("/api/v1/checkout/upi")
      .insert_header(bearer(&token))
      .set_json(json!({ "pincode": "560001" }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["order"]["subtotal"], json!(100_000));
    assert_eq!(body["order"]["tax"], json!(18_000));
    assert_eq!(body["order"]["total"], json!(118_000));
    assert_eq!(body["order"]["status"], json!("Pending"));
    assert_eq!(body["payment"]["vpa"], json!("shop@ibl"));
    let order_id = body["orderId"].as_str().unwrap().to_string();

    let confirm = || {
      test::TestRequest::post()
        .uri(&format!("/api/v1/checkout/upi/{}/confirm", order_id))
        .insert_header(bearer(&token))
        .to_request()
    };
    let resp = test::call_service(&app, confirm()).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let stored = backends.orders.find(&order_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);

    backends.settlements.record(order_id.as_str(), "UTR0001", Money::from_minor(118_000));
    let resp = test::call_service(&app, confirm()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["order"]["status"], json!("Paid"));
    assert_eq!(body["receipt"]["payment_method"], json!("UPI Payment"));
  }

  #[actix_web::test]
  async fn anonymous_card_checkout_is_rejected_by_default() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/api/v1/checkout/card")
      .insert_header(("X-Device-Id", "dev-1"))
      .set_json(json!({}))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[actix_web::test]
  async fn card_checkout_without_gateway_key_is_unavailable() {
    let mut config = AppConfig::for_tests();
    config.razorpay_key_id = None;
    config.anonymous_checkout = AnonymousCheckoutPolicy::Reject;
    let token = issue_test_token(&config.auth_jwt_secret, "u2", 600);
    let (state, backends) = in_memory_state(config);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/api/v1/cart/items")
      .insert_header(bearer(&token))
      .set_json(json!({ "id": "t1", "name": "Tee", "unit_price": 50_000 }))
      .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::post()
      .uri("/api/v1/checkout/card")
      .insert_header(bearer(&token))
      .set_json(json!({}))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(backends.orders.is_empty(), "no order is recorded when the gateway is unconfigured");
  }

  #[actix_web::test]
  async fn dismissed_callback_keeps_order_open() {
    let config = AppConfig::for_tests();
    let token = issue_test_token(&config.auth_jwt_secret, "u3", 600);
    let (state, _) = in_memory_state(config);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    // No such order: a dismissed callback still has to name one the caller owns.
    let req = test::TestRequest::post()
      .uri("/api/v1/checkout/card/callback")
      .insert_header(bearer(&token))
      .set_json(json!({ "order_id": "VT-999999", "outcome": "dismissed" }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
