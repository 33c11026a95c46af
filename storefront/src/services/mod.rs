// storefront/src/services/mod.rs

pub mod location;
pub mod razorpay;
pub mod session;
pub mod upi;

pub use location::LocationLookup;
pub use razorpay::RazorpayClient;
pub use session::JwtSessionResolver;
