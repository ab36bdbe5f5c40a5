//! # Daraja API Client
//!
//! Thin HTTP client for the two Daraja calls this system makes: the
//! OAuth client-credentials token and the STK push itself. No SDK; the
//! requests are small enough that reqwest + serde_json read clearer
//! than a wrapper.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{MpesaConfig, STK_TIMEOUT, TOKEN_TIMEOUT};
use crate::error::{PayError, PayResult};
use crate::phone::normalize_msisdn;

/// How many times the token request is attempted.
const TOKEN_ATTEMPTS: u32 = 3;

/// Base backoff between token attempts; grows linearly (500ms, 1s).
const TOKEN_BACKOFF_MS: u64 = 500;

/// Input for an STK push.
#[derive(Debug, Clone)]
pub struct StkPushRequest {
    /// Whole currency units (KSh), as Daraja expects. Convert from
    /// cents with [`duka_core::Money::to_units_rounded`].
    pub amount_units: i64,
    /// Payer MSISDN, any accepted local format.
    pub phone: String,
    /// Shows on the payer's statement.
    pub account_reference: String,
    pub transaction_desc: String,
}

/// The provider's answer to an accepted STK push.
#[derive(Debug, Clone)]
pub struct StkPushResponse {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    /// The full response body, stored for reconciliation fallbacks.
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for the Daraja API.
#[derive(Debug, Clone)]
pub struct MpesaClient {
    http: Client,
    config: MpesaConfig,
}

impl MpesaClient {
    /// Creates a client from configuration.
    pub fn new(config: MpesaConfig) -> PayResult<Self> {
        let http = Client::builder().timeout(config.http_timeout).build()?;
        Ok(MpesaClient { http, config })
    }

    /// Fetches an OAuth access token.
    ///
    /// Retried on network failure with linear backoff; a definitive
    /// provider rejection (non-2xx) is not retried.
    pub async fn access_token(&self) -> PayResult<String> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );

        let mut last_err: Option<PayError> = None;
        for attempt in 1..=TOKEN_ATTEMPTS {
            let result = self
                .http
                .get(&url)
                .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
                .timeout(TOKEN_TIMEOUT)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    let token: TokenResponse = response
                        .json()
                        .await
                        .map_err(|e| PayError::InvalidResponse(e.to_string()))?;
                    return Ok(token.access_token);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(PayError::Provider { status, body });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Token request failed");
                    last_err = Some(e.into());
                    if attempt < TOKEN_ATTEMPTS {
                        let backoff = TOKEN_BACKOFF_MS * u64::from(attempt);
                        tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| PayError::InvalidResponse("token retries exhausted".to_string())))
    }

    /// Sends an STK push to the payer's phone.
    pub async fn stk_push(&self, request: &StkPushRequest) -> PayResult<StkPushResponse> {
        let token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let phone = normalize_msisdn(&request.phone);

        let body = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": stk_password(&self.config.shortcode, &self.config.passkey, &timestamp),
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": request.amount_units,
            "PartyA": phone,
            "PartyB": self.config.shortcode,
            "PhoneNumber": phone,
            "CallBackURL": self.config.callback_url,
            "AccountReference": request.account_reference,
            "TransactionDesc": request.transaction_desc,
        });

        debug!(phone = %phone, amount_units = request.amount_units, "Sending STK push");

        let response = self
            .http
            .post(format!(
                "{}/mpesa/stkpush/v1/processrequest",
                self.config.base_url
            ))
            .bearer_auth(token)
            .json(&body)
            .timeout(STK_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PayError::Timeout("STK push timed out".to_string())
                } else {
                    PayError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PayError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PayError::InvalidResponse(e.to_string()))?;

        let merchant_request_id = string_field(&raw, "MerchantRequestID")?;
        let checkout_request_id = string_field(&raw, "CheckoutRequestID")?;

        debug!(
            checkout_request_id = %checkout_request_id,
            "STK push accepted"
        );

        Ok(StkPushResponse {
            merchant_request_id,
            checkout_request_id,
            raw,
        })
    }
}

/// `base64(shortcode + passkey + timestamp)`, the Daraja STK password.
fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{shortcode}{passkey}{timestamp}"))
}

fn string_field(value: &serde_json::Value, key: &str) -> PayResult<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| PayError::InvalidResponse(format!("missing {key}")))
}

// =============================================================================
// Unit Tests
// =============================================================================
