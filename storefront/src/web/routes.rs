// storefront/src/web/routes.rs

use actix_web::web;

use crate::state::AppState;
use crate::web::handlers::{
  cart_handlers, checkout_handlers, gateway_handlers, location_handlers, order_handlers, upi_handlers,
};

async fn health_check_handler(app_state: web::Data<AppState>) -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({
    "status": "ok",
    "dbConnections": app_state.db_pool.size(),
  }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  // Gateway endpoints the storefront client calls at the root.
  cfg
    .route("/createOrder", web::post().to(gateway_handlers::create_order_handler))
    .route("/verifySignature", web::post().to(gateway_handlers::verify_signature_handler));

  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/cart")
          .service(
            web::resource("")
              .route(web::get().to(cart_handlers::view_cart_handler))
              .route(web::delete().to(cart_handlers::clear_cart_handler)),
          )
          .route("/items", web::post().to(cart_handlers::add_to_cart_handler))
          .service(
            web::resource("/items/{product_id}")
              .route(web::put().to(cart_handlers::set_quantity_handler))
              .route(web::delete().to(cart_handlers::remove_item_handler)),
          )
          .route("/handoff", web::post().to(cart_handlers::cart_handoff_handler)),
      )
      .service(
        web::scope("/checkout")
          .route("/card", web::post().to(checkout_handlers::start_card_checkout_handler))
          .route("/card/callback", web::post().to(checkout_handlers::card_callback_handler))
          .route("/upi", web::post().to(checkout_handlers::start_upi_checkout_handler))
          .route("/upi/{order_id}/confirm", web::post().to(checkout_handlers::confirm_upi_handler)),
      )
      .service(
        web::scope("/orders")
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/receipt", web::get().to(order_handlers::receipt_handler)),
      )
      .route("/upi/validate", web::post().to(upi_handlers::validate_upi_handler))
      .route("/admin/upi/settlements", web::post().to(upi_handlers::record_settlement_handler))
      .service(
        web::scope("/location")
          .route("/pincode/{pincode}", web::get().to(location_handlers::pincode_handler))
          .route("/reverse", web::post().to(location_handlers::reverse_geocode_handler)),
      ),
  );
}
