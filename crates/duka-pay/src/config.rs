//! # M-Pesa Configuration
//!
//! Daraja credentials and endpoints, read from the environment.
//!
//! Values arrive from `.env` files in deployments where they are
//! sometimes wrapped in quotes; every value is trimmed and has one
//! layer of surrounding quotes stripped.

use std::time::Duration;

use crate::error::{PayError, PayResult};

/// Default timeout for the OAuth token request.
pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the STK push request.
pub const STK_TIMEOUT: Duration = Duration::from_secs(30);

/// Daraja API configuration.
#[derive(Debug, Clone)]
pub struct MpesaConfig {
    /// API base, e.g. `https://sandbox.safaricom.co.ke`.
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Business shortcode (paybill/till).
    pub shortcode: String,
    /// Passkey issued with the shortcode; feeds the STK password.
    pub passkey: String,
    /// Public URL Daraja will POST the result to.
    pub callback_url: String,
    /// Overall client timeout; per-request deadlines are tighter.
    pub http_timeout: Duration,
}

impl MpesaConfig {
    /// Loads configuration from `MPESA_*` environment variables.
    ///
    /// All missing keys are reported together so a half-configured
    /// deployment fails with one actionable message.
    pub fn from_env() -> PayResult<Self> {
        let mut missing = Vec::new();
        let mut get = |key: &str| match read_env(key) {
            Some(value) => value,
            None => {
                missing.push(key.to_string());
                String::new()
            }
        };

        let config = MpesaConfig {
            base_url: get("MPESA_BASE_URL"),
            consumer_key: get("MPESA_CONSUMER_KEY"),
            consumer_secret: get("MPESA_CONSUMER_SECRET"),
            shortcode: get("MPESA_SHORTCODE"),
            passkey: get("MPESA_PASSKEY"),
            callback_url: get("MPESA_CALLBACK_URL"),
            http_timeout: read_env("MPESA_HTTP_TIMEOUT_MS")
                .and_then(|ms| ms.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(STK_TIMEOUT),
        };

        if !missing.is_empty() {
            return Err(PayError::MissingConfig(missing.join(", ")));
        }

        Ok(config)
    }
}

/// Reads an environment variable, trimming whitespace and one layer of
/// surrounding quotes. Empty after trimming counts as absent.
fn read_env(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(trimmed);

    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; each uses its own key names
    // to stay independent of test ordering.

    #[test]
    fn test_read_env_strips_quotes_and_whitespace() {
        std::env::set_var("DUKA_TEST_QUOTED", "  \"secret-value\"  ");
        assert_eq!(read_env("DUKA_TEST_QUOTED").as_deref(), Some("secret-value"));

        std::env::set_var("DUKA_TEST_SINGLE", "'other'");
        assert_eq!(read_env("DUKA_TEST_SINGLE").as_deref(), Some("other"));

        std::env::set_var("DUKA_TEST_PLAIN", "plain");
        assert_eq!(read_env("DUKA_TEST_PLAIN").as_deref(), Some("plain"));
    }

    #[test]
    fn test_read_env_empty_is_absent() {
        std::env::set_var("DUKA_TEST_EMPTY", "   ");
        assert!(read_env("DUKA_TEST_EMPTY").is_none());
        assert!(read_env("DUKA_TEST_UNSET_NEVER").is_none());
    }

    #[test]
    fn test_missing_keys_reported_together() {
        // A clean environment misses everything; the error must name
        // every key, not just the first one hit.
        for key in [
            "MPESA_BASE_URL",
            "MPESA_CONSUMER_KEY",
            "MPESA_CONSUMER_SECRET",
            "MPESA_SHORTCODE",
            "MPESA_PASSKEY",
            "MPESA_CALLBACK_URL",
        ] {
            std::env::remove_var(key);
        }

        let err = MpesaConfig::from_env().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("MPESA_BASE_URL"));
        assert!(message.contains("MPESA_CALLBACK_URL"));
    }
}
