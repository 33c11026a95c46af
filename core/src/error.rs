// storefront-core/src/error.rs

use crate::order::OrderStatus;
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Errors raised by the pipeline engine itself.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Type mismatch during context downcast (expected {expected_type}, step: '{step_name}')")]
  TypeMismatch { step_name: String, expected_type: String },

  #[error("No flow registered for context type {context_type}")]
  NotRegistered { context_type: String },

  #[error("Configuration error for step '{step_name}': {message}")]
  ConfigurationError { step_name: String, message: String },

  #[error("Error in handler or external operation. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal flow error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for FlowError {
  fn from(err: AnyhowError) -> Self {
    FlowError::HandlerError { source: err }
  }
}

/// Errors from an `OrderStore` backend.
#[derive(Debug, Error)]
pub enum LedgerError {
  #[error("Order '{order_id}' not found")]
  NotFound { order_id: String },

  #[error("Order '{order_id}' is already {current}; refusing transition to {requested}")]
  Conflict {
    order_id: String,
    current: OrderStatus,
    requested: OrderStatus,
  },

  #[error("Order id '{order_id}' is already taken")]
  DuplicateOrderId { order_id: String },

  #[error("Ledger backend error: {0}")]
  Backend(#[from] AnyhowError),
}

/// Errors surfaced by the cart, ledger, gateway and checkout layers.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Validation error: {0}")]
  Validation(String),

  /// Missing key, secret or client configuration. Fatal for the current attempt.
  #[error("Configuration error: {0}")]
  Configuration(String),

  #[error("Payment gateway error: {message}")]
  Gateway { message: String, details: Option<String> },

  #[error("Payment signature verification failed for gateway order '{gateway_order_id}': {reason}")]
  VerificationFailed { gateway_order_id: String, reason: String },

  #[error("Order creation failed: {0}")]
  OrderCreation(String),

  #[error("Order update failed: {0}")]
  OrderUpdate(#[source] LedgerError),

  /// Money has moved but the ledger disagrees.
  #[error("Payment {payment_id} was verified but order {order_id} could not be updated: {reason}")]
  FinalizeAfterVerification {
    order_id: String,
    payment_id: String,
    reason: String,
  },

  #[error("Payment failed ({code}): {reason}")]
  PaymentFailed { code: String, reason: String },

  #[error("A checkout is already in progress for this session")]
  CheckoutInProgress,

  #[error("Timed out waiting for {operation}")]
  Timeout { operation: String },

  #[error("Authentication required: {0}")]
  Unauthenticated(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Storage error: {0}")]
  Storage(#[source] AnyhowError),

  #[error(transparent)]
  Flow(#[from] FlowError),
}

impl StoreError {
  pub fn validation(message: impl Into<String>) -> Self {
    StoreError::Validation(message.into())
  }

  pub fn configuration(message: impl Into<String>) -> Self {
    StoreError::Configuration(message.into())
  }
}

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;
