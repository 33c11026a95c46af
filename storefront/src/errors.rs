// storefront/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use storefront_core::{FlowError, LedgerError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  #[error(transparent)]
  Store(StoreError),

  #[error("Flow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

/// Flattens the store's own wrappers so the HTTP mapping sees one layer.
impl From<StoreError> for AppError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::Flow(source) => AppError::Workflow { source },
      StoreError::Unauthenticated(m) => AppError::Auth(m),
      StoreError::NotFound(m) => AppError::NotFound(m),
      other => AppError::Store(other),
    }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(db_err) => AppError::Sqlx(db_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl AppError {
  fn store_status(err: &StoreError) -> StatusCode {
    match err {
      StoreError::Validation(_) => StatusCode::BAD_REQUEST,
      StoreError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
      StoreError::NotFound(_) => StatusCode::NOT_FOUND,
      StoreError::VerificationFailed { .. } | StoreError::PaymentFailed { .. } => StatusCode::PAYMENT_REQUIRED,
      StoreError::CheckoutInProgress => StatusCode::CONFLICT,
      StoreError::OrderUpdate(LedgerError::Conflict { .. }) => StatusCode::CONFLICT,
      StoreError::OrderUpdate(LedgerError::NotFound { .. }) => StatusCode::NOT_FOUND,
      StoreError::Gateway { .. } => StatusCode::BAD_GATEWAY,
      StoreError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
      StoreError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
      StoreError::FinalizeAfterVerification { .. }
      | StoreError::OrderCreation(_)
      | StoreError::OrderUpdate(_)
      | StoreError::Storage(_)
      | StoreError::Flow(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn store_body(err: &StoreError) -> serde_json::Value {
    match err {
      StoreError::Validation(m) => json!({ "error": m }),
      StoreError::Gateway { message, details } => json!({
        "error": "Payment provider error",
        "detail": message,
        "details": details,
      }),
      StoreError::Configuration(m) => json!({
        "error": "This payment method is unavailable right now. Please try another method.",
        "detail": m,
      }),
      StoreError::VerificationFailed { .. } => json!({ "error": "Payment verification failed." }),
      StoreError::PaymentFailed { code, reason } => json!({ "error": "Payment failed", "code": code, "detail": reason }),
      StoreError::FinalizeAfterVerification { order_id, payment_id, .. } => json!({
        "error": "Your payment was verified but we could not update your order. Please contact support with these references.",
        "orderId": order_id,
        "paymentId": payment_id,
      }),
      StoreError::CheckoutInProgress => json!({ "error": "A checkout is already in progress." }),
      StoreError::Timeout { operation } => json!({ "error": "Upstream service timed out", "detail": operation }),
      StoreError::OrderUpdate(LedgerError::Conflict { order_id, current, .. }) => json!({
        "error": "Order is already finalized",
        "orderId": order_id,
        "status": current,
      }),
      other => json!({ "error": other.to_string() }),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Store(err) => Self::store_status(err),
      AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Migrate(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }
    let body = match self {
      AppError::Validation(m) | AppError::Auth(m) | AppError::NotFound(m) => json!({ "error": m }),
      AppError::Config(m) => json!({ "error": "Configuration issue", "detail": m }),
      AppError::Sqlx(_) | AppError::Migrate(_) => json!({ "error": "Database operation failed" }),
      AppError::Store(err) => Self::store_body(err),
      AppError::Workflow { source } => {
        tracing::error!(flow_error_source = ?source, "Workflow error details");
        json!({ "error": "Workflow processing error" })
      }
      AppError::Internal(_) => json!({ "error": "An internal error occurred" }),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use storefront_core::order::OrderStatus;

  #[test]
  fn store_errors_map_to_documented_statuses() {
    let cases = vec![
      (StoreError::validation("bad"), StatusCode::BAD_REQUEST),
      (StoreError::Unauthenticated("who".into()), StatusCode::UNAUTHORIZED),
      (
        StoreError::VerificationFailed {
          gateway_order_id: "order_1".into(),
          reason: "mismatch".into(),
        },
        StatusCode::PAYMENT_REQUIRED,
      ),
      (StoreError::CheckoutInProgress, StatusCode::CONFLICT),
      (
        StoreError::Gateway {
          message: "down".into(),
          details: None,
        },
        StatusCode::BAD_GATEWAY,
      ),
      (StoreError::configuration("no key"), StatusCode::SERVICE_UNAVAILABLE),
      (
        StoreError::FinalizeAfterVerification {
          order_id: "VT-100000".into(),
          payment_id: "pay_1".into(),
          reason: "db".into(),
        },
        StatusCode::INTERNAL_SERVER_ERROR,
      ),
      (
        StoreError::Timeout {
          operation: "gateway order create".into(),
        },
        StatusCode::GATEWAY_TIMEOUT,
      ),
      (
        StoreError::OrderUpdate(LedgerError::Conflict {
          order_id: "VT-100000".into(),
          current: OrderStatus::Paid,
          requested: OrderStatus::Failed,
        }),
        StatusCode::CONFLICT,
      ),
    ];
    for (err, expected) in cases {
      assert_eq!(AppError::from(err).status_code(), expected);
    }
  }

  #[test]
  fn unauthenticated_store_error_becomes_auth() {
    let err = AppError::from(StoreError::Unauthenticated("sign in".into()));
    assert!(matches!(err, AppError::Auth(_)));
  }
}
