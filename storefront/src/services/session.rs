// storefront/src/services/session.rs

//! Bearer-token sessions issued by the auth provider (HS256 JWTs).

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use storefront_core::identity::{Identity, SessionResolver, UserId, UserProfile};
use storefront_core::{StoreError, StoreResult};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  /// User id.
  pub sub: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  pub exp: usize,
}

pub struct JwtSessionResolver {
  key: DecodingKey,
  validation: Validation,
}

impl JwtSessionResolver {
  pub fn new(secret: &str) -> Self {
    Self {
      key: DecodingKey::from_secret(secret.as_bytes()),
      validation: Validation::new(Algorithm::HS256),
    }
  }

  fn profile_for(&self, token: &str) -> StoreResult<UserProfile> {
    let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
      ErrorKind::ExpiredSignature => StoreError::Unauthenticated("session expired".to_string()),
      _ => StoreError::Unauthenticated("invalid session token".to_string()),
    })?;
    let claims = data.claims;
    if claims.sub.trim().is_empty() {
      return Err(StoreError::Unauthenticated("session token has no subject".to_string()));
    }
    Ok(UserProfile {
      user_id: UserId::new(claims.sub),
      name: claims.name,
      email: claims.email,
      phone: claims.phone,
    })
  }
}

#[async_trait]
impl SessionResolver for JwtSessionResolver {
  async fn resolve(&self, bearer_token: Option<&str>, device_id: Option<&str>) -> StoreResult<Identity> {
    match bearer_token {
      None => {
        debug!(has_device = device_id.is_some(), "No bearer token; anonymous caller.");
        Ok(Identity::anonymous(device_id.map(str::to_string)))
      }
      Some(token) => self.profile_for(token).map(Identity::Authenticated),
    }
  }
}

#[cfg(test)]
pub(crate) fn issue_test_token(secret: &str, user_id: &str, ttl_secs: i64) -> String {
  use jsonwebtoken::{encode, EncodingKey, Header};
  let exp = (chrono::Utc::now().timestamp() + ttl_secs).max(0) as usize;
  let claims = Claims {
    sub: user_id.to_string(),
    name: Some(format!("User {}", user_id)),
    email: Some(format!("{}@example.com", user_id)),
    phone: None,
    exp,
  };
  encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn valid_token_resolves_to_user() {
    let resolver = JwtSessionResolver::new("k");
    let token = issue_test_token("k", "u1", 3600);
    let identity = resolver.resolve(Some(&token), Some("dev-1")).await.unwrap();
    assert_eq!(identity.user_id().map(|u| u.as_str()), Some("u1"));
    assert_eq!(identity.profile().and_then(|p| p.email.as_deref()), Some("u1@example.com"));
  }

  #[tokio::test]
  async fn no_token_is_anonymous_device() {
    let resolver = JwtSessionResolver::new("k");
    let identity = resolver.resolve(None, Some("dev-1")).await.unwrap();
    assert_eq!(identity, Identity::anonymous(Some("dev-1".to_string())));
  }

  #[tokio::test]
  async fn wrong_secret_and_expired_tokens_are_rejected() {
    let resolver = JwtSessionResolver::new("k");
    let forged = issue_test_token("other", "u1", 3600);
    assert!(matches!(
      resolver.resolve(Some(&forged), None).await,
      Err(StoreError::Unauthenticated(_))
    ));
    let expired = issue_test_token("k", "u1", -3600);
    assert!(matches!(
      resolver.resolve(Some(&expired), None).await,
      Err(StoreError::Unauthenticated(m)) if m == "session expired"
    ));
  }
}
