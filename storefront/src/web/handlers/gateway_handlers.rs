// storefront/src/web/handlers/gateway_handlers.rs

//! `/createOrder` and `/verifySignature`, the two gateway endpoints the
//! storefront client calls directly. Their bodies and status codes are a fixed
//! contract with that client, so they answer with their own JSON instead of the
//! general [`AppError`] mapping. Bodies are read raw so that a malformed
//! payload also gets the contract's answer.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use storefront_core::checkout::with_timeout;
use storefront_core::gateway::GatewayOrderRequest;
use storefront_core::{Money, StoreError};
use tracing::{error, info, instrument, warn};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
pub struct CreateOrderRequest {
  /// Kept loose so a string or a missing amount becomes a 400, not a parse error.
  #[serde(default)]
  pub amount: Option<serde_json::Value>,
  #[serde(default)]
  pub currency: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct VerifySignatureRequest {
  #[serde(default)]
  pub razorpay_order_id: Option<String>,
  #[serde(default)]
  pub razorpay_payment_id: Option<String>,
  #[serde(default)]
  pub razorpay_signature: Option<String>,
}

/// A positive whole number of minor units.
fn parse_amount(raw: Option<&serde_json::Value>) -> Option<Money> {
  raw
    .and_then(serde_json::Value::as_i64)
    .filter(|minor| *minor > 0)
    .map(Money::from_minor)
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}

#[instrument(name = "handler::create_gateway_order", skip_all)]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let CreateOrderRequest { amount, currency } = serde_json::from_slice(&body).unwrap_or_default();
  let Some(amount) = parse_amount(amount.as_ref()) else {
    warn!("Rejected gateway order request with an invalid amount.");
    return Ok(HttpResponse::BadRequest().json(json!({ "error": "Invalid amount" })));
  };

  let request = GatewayOrderRequest {
    amount,
    currency: non_blank(currency).unwrap_or_else(|| app_state.config.store_currency.clone()),
    receipt: format!("receipt_order_{}", Utc::now().timestamp_millis()),
    auto_capture: true,
  };
  let services = &app_state.services;
  let created = with_timeout(
    services.policy.external_call_timeout,
    "gateway order create",
    services.gateway.create_order(&request),
  )
  .await;

  match created {
    Ok(order) => {
      info!(gateway_order_id = %order.id, amount = %order.amount, "Gateway order created.");
      Ok(HttpResponse::Ok().json(order))
    }
    Err(e) => {
      let details = match &e {
        StoreError::Gateway { message, details } => details.clone().unwrap_or_else(|| message.clone()),
        other => other.to_string(),
      };
      error!(error = %e, "Gateway order creation failed.");
      Ok(HttpResponse::InternalServerError().json(json!({
        "error": "Failed to create Razorpay order",
        "details": details,
      })))
    }
  }
}

/// Answers 200 for both outcomes; a mismatch is a result, not a server fault.
#[instrument(name = "handler::verify_signature", skip_all)]
pub async fn verify_signature_handler(
  app_state: web::Data<AppState>,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let verifier = &app_state.services.verifier;
  if !verifier.is_configured() {
    error!("Signature verification requested but the gateway secret is not configured.");
    return Ok(HttpResponse::InternalServerError().json(json!({
      "error": "Server configuration error: Missing Razorpay secret.",
    })));
  }

  let VerifySignatureRequest {
    razorpay_order_id,
    razorpay_payment_id,
    razorpay_signature,
  } = serde_json::from_slice(&body).unwrap_or_default();
  let (Some(order_id), Some(payment_id), Some(signature)) = (
    non_blank(razorpay_order_id),
    non_blank(razorpay_payment_id),
    non_blank(razorpay_signature),
  ) else {
    return Ok(HttpResponse::BadRequest().json(json!({
      "error": "Missing Razorpay payment details for verification.",
    })));
  };

  if verifier.verify(&order_id, &payment_id, &signature)? {
    info!(gateway_order_id = %order_id, gateway_payment_id = %payment_id, "Payment signature verified.");
    Ok(HttpResponse::Ok().json(json!({ "verified": true, "paymentId": payment_id })))
  } else {
    warn!(
      gateway_order_id = %order_id,
      gateway_payment_id = %payment_id,
      security_event = true,
      "Payment signature mismatch."
    );
    Ok(HttpResponse::Ok().json(json!({ "verified": false })))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::state::testing::in_memory_state;
  use crate::web::configure_app_routes;
  use actix_web::http::StatusCode;
  use actix_web::{test, App};
  use serde_json::Value;

  const KNOWN_SIGNATURE: &str = "44422d618d76e6e81c5f002f4d5108385750b52eb8db4e9c7a4231ddfac02840";

  fn proof(signature: &str) -> Value {
    json!({
      "razorpay_order_id": "order_1",
      "razorpay_payment_id": "pay_1",
      "razorpay_signature": signature,
    })
  }

  #[actix_web::test]
  async fn create_order_rejects_zero_amount() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    for body in [json!({ "amount": 0, "currency": "INR" }), json!({ "currency": "INR" }), json!({ "amount": "100" })] {
      let req = test::TestRequest::post().uri("/createOrder").set_json(body).to_request();
      let resp = test::call_service(&app, req).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
      let body: Value = test::read_body_json(resp).await;
      assert_eq!(body, json!({ "error": "Invalid amount" }));
    }
  }

  #[actix_web::test]
  async fn create_order_with_unreadable_body_is_invalid_amount() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    for payload in ["{\"amount\": 100", "", "not json"] {
      let req = test::TestRequest::post()
        .uri("/createOrder")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload)
        .to_request();
      let resp = test::call_service(&app, req).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{payload:?}");
      let body: Value = test::read_body_json(resp).await;
      assert_eq!(body, json!({ "error": "Invalid amount" }));
    }
  }

  #[actix_web::test]
  async fn create_order_reports_gateway_failure_as_500() {
    // The test gateway base points at a closed port.
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/createOrder")
      .set_json(json!({ "amount": 118000, "currency": "INR" }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("Failed to create Razorpay order"));
    assert!(body["details"].is_string());
  }

  #[actix_web::test]
  async fn verify_signature_known_vector_and_mutation() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/verifySignature")
      .set_json(proof(KNOWN_SIGNATURE))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "verified": true, "paymentId": "pay_1" }));

    let mut mutated = KNOWN_SIGNATURE.to_string();
    mutated.replace_range(0..1, "5");
    let req = test::TestRequest::post()
      .uri("/verifySignature")
      .set_json(proof(&mutated))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "verified": false }));
  }

  #[actix_web::test]
  async fn verify_signature_missing_fields_is_400() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/verifySignature")
      .set_json(json!({ "razorpay_order_id": "order_1", "razorpay_signature": KNOWN_SIGNATURE }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("Missing Razorpay payment details for verification."));
  }

  #[actix_web::test]
  async fn verify_signature_unreadable_body_is_missing_details() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/verifySignature")
      .insert_header(("Content-Type", "application/json"))
      .set_payload("{\"razorpay_order_id\":")
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("Missing Razorpay payment details for verification."));
  }

  #[actix_web::test]
  async fn verify_signature_without_secret_is_500() {
    let mut config = AppConfig::for_tests();
    config.razorpay_key_secret = None;
    let (state, _) = in_memory_state(config);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/verifySignature")
      .set_json(proof(KNOWN_SIGNATURE))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], json!("Server configuration error: Missing Razorpay secret."));
  }
}
