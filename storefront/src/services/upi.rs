// storefront/src/services/upi.rs

//! Syntactic checks for UPI virtual payment addresses.

/// `handle@provider`: a 2-256 character handle of letters, digits, `.`, `_` or
/// `-`, and a provider of 2-64 letters or digits starting with a letter.
pub fn is_valid_upi_id(candidate: &str) -> bool {
  let candidate = candidate.trim();
  let Some((handle, provider)) = candidate.split_once('@') else {
    return false;
  };
  let handle_ok = (2..=256).contains(&handle.len())
    && handle
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
  let provider_ok = (2..=64).contains(&provider.len())
    && provider.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
    && provider.chars().all(|c| c.is_ascii_alphanumeric());
  handle_ok && provider_ok
}
