// storefront/src/web/extractors.rs

use actix_web::dev::Payload;
use actix_web::http::header::{HeaderName, AUTHORIZATION, USER_AGENT};
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use storefront_core::identity::Identity;
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

pub const DEVICE_ID_HEADER: &str = "x-device-id";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Whoever is calling: a signed-in user from the bearer token, or an anonymous
/// device from `X-Device-Id`.
#[derive(Debug)]
pub struct Caller {
  pub identity: Identity,
  pub device_id: Option<String>,
  pub user_agent: Option<String>,
}

fn header_value(req: &HttpRequest, name: impl TryInto<HeaderName>) -> Option<String> {
  let name = name.try_into().ok()?;
  req
    .headers()
    .get(&name)
    .and_then(|v| v.to_str().ok())
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}

/// A present Authorization header that is not a bearer token is rejected, not
/// treated as anonymous.
fn bearer_token(req: &HttpRequest) -> Result<Option<String>, AppError> {
  match header_value(req, AUTHORIZATION) {
    None => Ok(None),
    Some(raw) => match raw.strip_prefix("Bearer ").map(str::trim) {
      Some(token) if !token.is_empty() => Ok(Some(token.to_string())),
      _ => {
        warn!("Rejected a malformed Authorization header.");
        Err(AppError::Auth("expected a Bearer token".to_string()))
      }
    },
  }
}

impl FromRequest for Caller {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let state = req.app_data::<web::Data<AppState>>().cloned();
    let token = bearer_token(req);
    let device_id = header_value(req, DEVICE_ID_HEADER);
    let user_agent = header_value(req, USER_AGENT);

    Box::pin(async move {
      let state = state.ok_or_else(|| AppError::Internal("application state is not registered".to_string()))?;
      let token = token?;
      let identity = state.sessions.resolve(token.as_deref(), device_id.as_deref()).await?;
      Ok(Caller {
        identity,
        device_id,
        user_agent,
      })
    })
  }
}

/// Operator access for settlement recording, checked against `ADMIN_API_TOKEN`.
/// Without a configured token the operator routes answer 404.
#[derive(Debug)]
pub struct Operator;

impl FromRequest for Operator {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let expected = req
      .app_data::<web::Data<AppState>>()
      .and_then(|s| s.config.admin_api_token.clone());
    let presented = header_value(req, ADMIN_TOKEN_HEADER);
    let result = match (expected, presented) {
      (None, _) => Err(AppError::NotFound("Not found".to_string())),
      (Some(expected), Some(presented)) if expected == presented => Ok(Operator),
      _ => {
        warn!(security_event = true, "Operator endpoint called without a valid token.");
        Err(AppError::Auth("operator token required".to_string()))
      }
    };
    futures_util::future::ready(result)
  }
}
