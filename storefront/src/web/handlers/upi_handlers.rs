// storefront/src/web/handlers/upi_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use storefront_core::checkout::with_timeout;
use storefront_core::order::PaymentMethod;
use storefront_core::Money;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::services::upi::is_valid_upi_id;
use crate::state::AppState;
use crate::web::extractors::Operator;

#[derive(Deserialize, Debug)]
pub struct ValidateUpiRequest {
  #[serde(default)]
  pub upi_id: String,
}

#[derive(Deserialize, Debug)]
pub struct RecordSettlementRequest {
  pub order_id: String,
  /// Bank or UTR reference of the incoming transfer.
  pub reference: String,
  /// Minor units actually received.
  pub amount: i64,
}

pub async fn validate_upi_handler(req_payload: web::Json<ValidateUpiRequest>) -> HttpResponse {
  let valid = is_valid_upi_id(&req_payload.upi_id);
  HttpResponse::Ok().json(json!({ "valid": valid }))
}

/// Operator entry point for money seen on the merchant account. The order is
/// not touched here; the next confirm call picks the settlement up.
#[instrument(
  name = "handler::record_upi_settlement",
  skip(app_state, _operator, req_payload),
  fields(order_id = %req_payload.order_id, amount = req_payload.amount)
)]
pub async fn record_settlement_handler(
  app_state: web::Data<AppState>,
  _operator: Operator,
  req_payload: web::Json<RecordSettlementRequest>,
) -> Result<HttpResponse, AppError> {
  let RecordSettlementRequest {
    order_id,
    reference,
    amount,
  } = req_payload.into_inner();
  if order_id.trim().is_empty() || reference.trim().is_empty() {
    return Err(AppError::Validation("order_id and reference are required".to_string()));
  }
  if amount <= 0 {
    return Err(AppError::Validation("amount must be positive".to_string()));
  }
  let order_id = order_id.trim();

  let order = with_timeout(
    app_state.config.external_call_timeout,
    "order lookup",
    app_state.services.ledger.find(order_id),
  )
  .await?
  .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  if order.payment_method != PaymentMethod::Upi {
    return Err(AppError::Validation(format!("order {} is not a UPI order", order_id)));
  }

  app_state
    .settlements
    .record(order_id, reference.trim(), Money::from_minor(amount))
    .await?;
  info!("Settlement recorded by operator.");
  Ok(HttpResponse::Created().json(json!({
    "orderId": order_id,
    "reference": reference.trim(),
    "amount": amount,
  })))
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
  use storefront_core::checkout::{Settlement, SettlementCheck};

  #[actix_web::test]
  async fn validate_reports_syntax_only() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    for (upi_id, expected) in [("shop@ibl", true), ("shop", false)] {
      let req = test::TestRequest::post()
        .uri("/api/v1/upi/validate")
        .set_json(json!({ "upi_id": upi_id }))
        .to_request();
      let body: Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(body["valid"], json!(expected), "{upi_id}");
    }
  }

  #[actix_web::test]
  async fn settlements_need_the_operator_token() {
    let config = AppConfig::for_tests();
    let (state, backends) = in_memory_state(config.clone());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;
    let token = issue_test_token(&config.auth_jwt_secret, "u1", 600);

    let req = test::TestRequest::post()
      .uri("/api/v1/cart/items")
      .insert_header(("Authorization", format!("Bearer {}", token)))
      .set_json(json!({ "id": "t1", "name": "Tee", "unit_price": 50_000, "quantity": 2 }))
      .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());
    let req = test::TestRequest::post()
      .uri("/api/v1/checkout/upi")
      .insert_header(("Authorization", format!("Bearer {}", token)))
      .set_json(json!({}))
      .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let order_id = created["orderId"].as_str().unwrap().to_string();
    let body = json!({ "order_id": order_id, "reference": "UTR77", "amount": 118000 });

    let req = test::TestRequest::post()
      .uri("/api/v1/admin/upi/settlements")
      .set_json(body.clone())
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
      .uri("/api/v1/admin/upi/settlements")
      .insert_header(("X-Admin-Token", "ops-token"))
      .set_json(body)
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    assert_eq!(
      backends.settlements.check(&order_id, Money::from_minor(118000)).await.unwrap(),
      Settlement::Settled {
        reference: "UTR77".into()
      }
    );
  }

  #[actix_web::test]
  async fn settlement_for_unknown_order_is_404_and_not_recorded() {
    let (state, backends) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/api/v1/admin/upi/settlements")
      .insert_header(("X-Admin-Token", "ops-token"))
      .set_json(json!({ "order_id": "VT-000000", "reference": "UTR1", "amount": 100 }))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
      backends.settlements.check("VT-000000", Money::from_minor(100)).await.unwrap(),
      Settlement::Unsettled
    );
  }

  #[actix_web::test]
  async fn operator_routes_are_absent_without_a_configured_token() {
    let mut config = AppConfig::for_tests();
    config.admin_api_token = None;
    let (state, _) = in_memory_state(config);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/api/v1/admin/upi/settlements")
      .insert_header(("X-Admin-Token", "ops-token"))
      .set_json(json!({ "order_id": "VT-123456", "reference": "UTR1", "amount": 100 }))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
  }
}
