// storefront/src/web/handlers/mod.rs

pub mod cart_handlers;
pub mod checkout_handlers;
pub mod gateway_handlers;
pub mod location_handlers;
pub mod order_handlers;
pub mod upi_handlers;
