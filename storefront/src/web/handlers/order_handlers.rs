// storefront/src/web/handlers/order_handlers.rs

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use storefront_core::checkout::with_timeout;
use storefront_core::order::Order;
use storefront_core::receipt::Receipt;
use tracing::instrument;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::Caller;

/// Someone else's order is reported exactly like a missing one.
async fn load_owned_order(app_state: &AppState, caller: &Caller, order_id: &str) -> Result<Order, AppError> {
  let user = caller.identity.require_user()?;
  let found = with_timeout(
    app_state.config.external_call_timeout,
    "order lookup",
    app_state.services.ledger.find(order_id),
  )
  .await?;
  match found {
    Some(order) if order.is_owned_by(&user.user_id) => Ok(order),
    _ => Err(AppError::NotFound(format!("Order {} not found", order_id))),
  }
}

#[instrument(name = "handler::get_order", skip(app_state, caller))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order = load_owned_order(&app_state, &caller, &path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::download_receipt", skip(app_state, caller))]
pub async fn receipt_handler(
  app_state: web::Data<AppState>,
  caller: Caller,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order = load_owned_order(&app_state, &caller, &path.into_inner()).await?;
  let receipt = Receipt::render(&order, &order.lines, &order.payment_method)
    .with_issuer(app_state.services.policy.issuer.clone());

  Ok(
    HttpResponse::Ok()
      .content_type("text/plain; charset=utf-8")
      .insert_header(ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(receipt.file_name())],
      })
      .body(receipt.to_text()),
  )
}
