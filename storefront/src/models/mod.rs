// storefront/src/models/mod.rs

//! Row types as they come out of Postgres, and their conversion into core types.

pub mod cart_item;
pub mod order;
pub mod settlement;

pub use cart_item::CartItemRow;
pub use order::OrderRow;
pub use settlement::SettlementRow;
