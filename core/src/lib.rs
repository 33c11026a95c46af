// storefront-core/src/lib.rs

//! Order and payment reconciliation core for the storefront.
//!
//! The crate takes a cart, records a durable order, hands off to a payment
//! gateway, verifies the gateway's signed callback and moves the order to a
//! terminal state exactly once. Pieces, leaf first:
//!
//!  - [`money`]: integer minor-unit amounts and GST.
//!  - [`cart`]: the Cart Store with device-local and remote backends.
//!  - [`identity`]: who is checking out.
//!  - [`ledger`]: the Order Ledger with a status-guarded `finalize`.
//!  - [`gateway`] and [`signature`]: the payment gateway contract and HMAC verification.
//!  - [`receipt`]: receipt rendering from an order snapshot.
//!  - [`checkout`]: card and UPI flows, each a [`flow::Pipeline`] of named steps.
//!
//! Storage and gateway backends are traits; in-memory implementations ship with
//! the crate so whole flows can run without a database.

pub mod cart;
pub mod checkout;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod identity;
pub mod ledger;
pub mod money;
pub mod order;
pub mod receipt;
pub mod signature;

pub use crate::error::{FlowError, LedgerError, StoreError, StoreResult};
pub use crate::flow::{ContextData, FlowRegistry, Pipeline, PipelineControl, PipelineResult, StepDef};
pub use crate::money::Money;
