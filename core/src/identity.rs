// storefront-core/src/identity.rs

//! Session identity: an authenticated user or an anonymous device.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable user identifier issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self {
    UserId(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// What the auth provider knows about a user. Used to prefill hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
  pub user_id: UserId,
  pub name: Option<String>,
  pub email: Option<String>,
  pub phone: Option<String>,
}

impl UserProfile {
  pub fn new(user_id: impl Into<String>) -> Self {
    Self {
      user_id: UserId::new(user_id),
      name: None,
      email: None,
      phone: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
  /// No session. `device_id` binds the cart to the client device when known.
  Anonymous { device_id: Option<String> },
  Authenticated(UserProfile),
}

/// Who owns a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartOwner {
  User(UserId),
  Device(String),
}

impl Identity {
  pub fn anonymous(device_id: Option<String>) -> Self {
    Identity::Anonymous { device_id }
  }

  pub fn is_authenticated(&self) -> bool {
    matches!(self, Identity::Authenticated(_))
  }

  pub fn user_id(&self) -> Option<&UserId> {
    match self {
      Identity::Authenticated(profile) => Some(&profile.user_id),
      Identity::Anonymous { .. } => None,
    }
  }

  pub fn profile(&self) -> Option<&UserProfile> {
    match self {
      Identity::Authenticated(profile) => Some(profile),
      Identity::Anonymous { .. } => None,
    }
  }

  /// The cart owner for this identity. An anonymous caller without a device id
  /// has nowhere to keep a cart.
  pub fn cart_owner(&self) -> StoreResult<CartOwner> {
    match self {
      Identity::Authenticated(profile) => Ok(CartOwner::User(profile.user_id.clone())),
      Identity::Anonymous { device_id: Some(device) } if !device.trim().is_empty() => {
        Ok(CartOwner::Device(device.clone()))
      }
      Identity::Anonymous { .. } => Err(StoreError::Unauthenticated(
        "an anonymous cart needs a device id".to_string(),
      )),
    }
  }

  /// Key used to serialise checkouts for the same caller.
  pub fn checkout_key(&self) -> StoreResult<String> {
    Ok(match self.cart_owner()? {
      CartOwner::User(id) => format!("user:{}", id),
      CartOwner::Device(device) => format!("device:{}", device),
    })
  }

  pub fn require_user(&self) -> StoreResult<&UserProfile> {
    self
      .profile()
      .ok_or_else(|| StoreError::Unauthenticated("this operation requires a signed-in user".to_string()))
  }
}

/// Resolves a caller's credentials to an [`Identity`].
///
/// A missing token is an anonymous caller; a present but invalid token is an
/// error, never silently anonymous.
#[async_trait]
pub trait SessionResolver: Send + Sync {
  async fn resolve(&self, bearer_token: Option<&str>, device_id: Option<&str>) -> StoreResult<Identity>;
}

/// Token-to-profile table. Handy for tests and local development.
#[derive(Default)]
pub struct StaticSessions {
  sessions: RwLock<HashMap<String, UserProfile>>,
}

impl StaticSessions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, token: impl Into<String>, profile: UserProfile) {
    self.sessions.write().insert(token.into(), profile);
  }
}

#[async_trait]
impl SessionResolver for StaticSessions {
  async fn resolve(&self, bearer_token: Option<&str>, device_id: Option<&str>) -> StoreResult<Identity> {
    match bearer_token {
      None => Ok(Identity::anonymous(device_id.map(str::to_string))),
      Some(token) => self
        .sessions
        .read()
        .get(token)
        .cloned()
        .map(Identity::Authenticated)
        .ok_or_else(|| StoreError::Unauthenticated("unknown session token".to_string())),
    }
  }
}
