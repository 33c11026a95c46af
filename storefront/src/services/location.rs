// storefront/src/services/location.rs

//! Best-effort address enrichment: India Post pincode lookup and Nominatim
//! reverse geocoding. Nothing here may block checkout, so upstream failures
//! come back as `None`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use storefront_core::order::validate_pincode;
use storefront_core::{StoreError, StoreResult};
use tracing::{instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PincodeLocation {
  pub pincode: String,
  pub district: String,
  pub state: String,
  /// "District, State, India"
  pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReverseLocation {
  pub city: String,
  pub state: String,
  pub pincode: String,
  pub full_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PostOfficeResponse {
  status: String,
  #[serde(default)]
  post_office: Option<Vec<PostOffice>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PostOffice {
  district: String,
  state: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
  #[serde(default)]
  display_name: Option<String>,
  #[serde(default)]
  address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
  city: Option<String>,
  town: Option<String>,
  village: Option<String>,
  state: Option<String>,
  postcode: Option<String>,
}

#[derive(Clone)]
pub struct LocationLookup {
  client: reqwest::Client,
  pincode_api_base: String,
  nominatim_base: String,
}

impl LocationLookup {
  pub fn new(pincode_api_base: impl Into<String>, nominatim_base: impl Into<String>, timeout: Duration) -> Self {
    // Nominatim's usage policy requires an identifying user agent.
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
      .build()
      .unwrap_or_else(|e| {
        warn!(error = %e, "Falling back to a default HTTP client for location lookups.");
        reqwest::Client::new()
      });
    Self {
      client,
      pincode_api_base: pincode_api_base.into().trim_end_matches('/').to_string(),
      nominatim_base: nominatim_base.into().trim_end_matches('/').to_string(),
    }
  }

  /// A malformed pincode is a validation error; an unreachable or unhelpful
  /// upstream is `Ok(None)`.
  #[instrument(name = "location::pincode", skip(self))]
  pub async fn lookup_pincode(&self, pincode: &str) -> StoreResult<Option<PincodeLocation>> {
    validate_pincode(pincode)?;
    let url = format!("{}/pincode/{}", self.pincode_api_base, pincode);
    let body = match self.fetch_json::<Vec<PostOfficeResponse>>(&url).await {
      Some(body) => body,
      None => return Ok(None),
    };
    Ok(pincode_location(pincode, body))
  }

  #[instrument(name = "location::reverse", skip(self))]
  pub async fn reverse(&self, lat: f64, lon: f64) -> StoreResult<Option<ReverseLocation>> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
      return Err(StoreError::validation("latitude or longitude out of range"));
    }
    let url = format!(
      "{}/reverse?format=jsonv2&lat={}&lon={}",
      self.nominatim_base, lat, lon
    );
    Ok(self.fetch_json::<NominatimResponse>(&url).await.map(reverse_location))
  }

  async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Option<T> {
    let response = match self.client.get(url).send().await {
      Ok(r) => r,
      Err(e) => {
        warn!(error = %e, "Location lookup request failed.");
        return None;
      }
    };
    if !response.status().is_success() {
      warn!(http_status = response.status().as_u16(), "Location lookup returned an error status.");
      return None;
    }
    match response.json::<T>().await {
      Ok(body) => Some(body),
      Err(e) => {
        warn!(error = %e, "Location lookup response could not be parsed.");
        None
      }
    }
  }
}

fn pincode_location(pincode: &str, body: Vec<PostOfficeResponse>) -> Option<PincodeLocation> {
  let first = body.into_iter().next()?;
  if first.status != "Success" {
    return None;
  }
  let office = first.post_office?.into_iter().next()?;
  Some(PincodeLocation {
    pincode: pincode.to_string(),
    display: format!("{}, {}, India", office.district, office.state),
    district: office.district,
    state: office.state,
  })
}

fn reverse_location(body: NominatimResponse) -> ReverseLocation {
  let address = body.address;
  ReverseLocation {
    city: address.city.or(address.town).or(address.village).unwrap_or_default(),
    state: address.state.unwrap_or_default(),
    pincode: address.postcode.unwrap_or_default(),
    full_address: body.display_name,
  }
}
