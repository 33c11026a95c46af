// storefront/src/web/handlers/location_handlers.rs

//! Best-effort address helpers. An unreachable upstream answers
//! `found: false`; only malformed input is an error.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct ReverseGeocodeRequest {
  pub lat: f64,
  pub lon: f64,
}

#[instrument(name = "handler::pincode_lookup", skip(app_state))]
pub async fn pincode_handler(app_state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
  let location = app_state.location.lookup_pincode(&path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "found": location.is_some(),
    "location": location,
  })))
}

#[instrument(name = "handler::reverse_geocode", skip(app_state))]
pub async fn reverse_geocode_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<ReverseGeocodeRequest>,
) -> Result<HttpResponse, AppError> {
  let location = app_state.location.reverse(req_payload.lat, req_payload.lon).await?;
  Ok(HttpResponse::Ok().json(json!({
    "found": location.is_some(),
    "location": location,
  })))
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

  #[actix_web::test]
  async fn malformed_pincode_is_400_and_unreachable_lookup_is_not_found() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::get().uri("/api/v1/location/pincode/56A001").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/api/v1/location/pincode/560001").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["found"], json!(false));
  }

  #[actix_web::test]
  async fn out_of_range_coordinates_are_rejected() {
    let (state, _) = in_memory_state(AppConfig::for_tests());
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;

    let req = test::TestRequest::post()
      .uri("/api/v1/location/reverse")
      .set_json(json!({ "lat": 120.0, "lon": 77.5 }))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
  }
}
