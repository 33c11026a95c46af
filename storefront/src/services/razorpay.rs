// storefront/src/services/razorpay.rs

//! Razorpay Orders API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use storefront_core::gateway::{GatewayOrder, GatewayOrderRequest, PaymentGateway};
use storefront_core::{StoreError, StoreResult};
use tracing::{info, instrument, warn};

pub const GATEWAY_NAME: &str = "Razorpay";

#[derive(Clone)]
pub struct RazorpayClient {
  client: reqwest::Client,
  api_base: String,
  key_id: Option<String>,
  key_secret: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
  amount: i64,
  currency: &'a str,
  receipt: &'a str,
  payment_capture: u8,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
  error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  code: Option<String>,
  #[serde(default)]
  description: Option<String>,
}

impl RazorpayClient {
  pub fn new(api_base: impl Into<String>, key_id: Option<String>, key_secret: Option<String>, timeout: Duration) -> Self {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .unwrap_or_else(|e| {
        warn!(error = %e, "Falling back to a default HTTP client for Razorpay.");
        reqwest::Client::new()
      });
    Self {
      client,
      api_base: api_base.into().trim_end_matches('/').to_string(),
      key_id,
      key_secret,
    }
  }

  fn credentials(&self) -> StoreResult<(&str, &str)> {
    match (self.key_id.as_deref(), self.key_secret.as_deref()) {
      (Some(id), Some(secret)) => Ok((id, secret)),
      _ => Err(StoreError::configuration("Razorpay key id or secret is not configured")),
    }
  }

  async fn read_order(response: reqwest::Response) -> StoreResult<GatewayOrder> {
    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      let parsed = serde_json::from_str::<ErrorEnvelope>(&text).ok().map(|e| e.error);
      let message = parsed
        .as_ref()
        .and_then(|e| e.description.clone())
        .unwrap_or_else(|| format!("Razorpay responded with {}", status));
      let details = parsed.and_then(|e| e.code).or_else(|| (!text.is_empty()).then_some(text));
      warn!(http_status = status.as_u16(), message = %message, "Razorpay request rejected.");
      return Err(StoreError::Gateway { message, details });
    }
    response.json::<GatewayOrder>().await.map_err(|e| StoreError::Gateway {
      message: "Failed to parse Razorpay response".to_string(),
      details: Some(e.to_string()),
    })
  }
}

fn transport_error(err: reqwest::Error) -> StoreError {
  StoreError::Gateway {
    message: "Could not reach Razorpay".to_string(),
    details: Some(err.to_string()),
  }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
  fn name(&self) -> &str {
    GATEWAY_NAME
  }

  fn public_key(&self) -> Option<&str> {
    self.key_id.as_deref()
  }

  #[instrument(name = "Razorpay::create_order", skip_all, fields(receipt = %request.receipt, amount = %request.amount))]
  async fn create_order(&self, request: &GatewayOrderRequest) -> StoreResult<GatewayOrder> {
    let (key_id, key_secret) = self.credentials()?;
    let body = CreateOrderBody {
      amount: request.amount.minor(),
      currency: &request.currency,
      receipt: &request.receipt,
      payment_capture: u8::from(request.auto_capture),
    };
    let response = self
      .client
      .post(format!("{}/orders", self.api_base))
      .basic_auth(key_id, Some(key_secret))
      .json(&body)
      .send()
      .await
      .map_err(transport_error)?;
    let order = Self::read_order(response).await?;
    info!(gateway_order_id = %order.id, "Razorpay order created.");
    Ok(order)
  }

  #[instrument(name = "Razorpay::fetch_order", skip(self))]
  async fn fetch_order(&self, gateway_order_id: &str) -> StoreResult<GatewayOrder> {
    let (key_id, key_secret) = self.credentials()?;
    let response = self
      .client
      .get(format!("{}/orders/{}", self.api_base, gateway_order_id))
      .basic_auth(key_id, Some(key_secret))
      .send()
      .await
      .map_err(transport_error)?;
    Self::read_order(response).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use storefront_core::Money;

  #[test]
  fn create_body_uses_minor_units_and_auto_capture() {
    let request = GatewayOrderRequest {
      amount: Money::from_minor(118_000),
      currency: "INR".to_string(),
      receipt: "VT-123456".to_string(),
      auto_capture: true,
    };
    let body = CreateOrderBody {
      amount: request.amount.minor(),
      currency: &request.currency,
      receipt: &request.receipt,
      payment_capture: u8::from(request.auto_capture),
    };
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(
      json,
      serde_json::json!({ "amount": 118000, "currency": "INR", "receipt": "VT-123456", "payment_capture": 1 })
    );
  }

  #[test]
  fn gateway_order_payload_parses() {
    let payload = r#"{"id":"order_NX1","entity":"order","amount":118000,"amount_paid":0,
      "currency":"INR","receipt":"VT-123456","status":"created","attempts":0}"#;
    let order: GatewayOrder = serde_json::from_str(payload).unwrap();
    assert_eq!(order.id, "order_NX1");
    assert_eq!(order.amount, Money::from_minor(118_000));
    assert_eq!(order.receipt.as_deref(), Some("VT-123456"));
    assert_eq!(order.extra.get("entity"), Some(&serde_json::json!("order")));
  }

  #[tokio::test]
  async fn missing_credentials_fail_before_any_request() {
    let client = RazorpayClient::new("http://127.0.0.1:9", Some("rzp_test".into()), None, Duration::from_secs(1));
    let request = GatewayOrderRequest {
      amount: Money::from_minor(100),
      currency: "INR".to_string(),
      receipt: "r".to_string(),
      auto_capture: true,
    };
    let err = client.create_order(&request).await.unwrap_err();
    assert!(matches!(err, StoreError::Configuration(_)));
  }
}
