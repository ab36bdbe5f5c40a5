//! # STK Callback Parsing
//!
//! Typed parsing of the asynchronous provider callback.
//!
//! ## Wire Shape
//! ```text
//! {
//!   "Body": {
//!     "stkCallback": {
//!       "MerchantRequestID": "29115-34620561-1",
//!       "CheckoutRequestID": "ws_CO_191220191020363925",
//!       "ResultCode": 0,
//!       "ResultDesc": "The service request is processed successfully.",
//!       "CallbackMetadata": {
//!         "Item": [
//!           { "Name": "Amount", "Value": 600.00 },
//!           { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
//!           { "Name": "PhoneNumber", "Value": 254708374149 }
//!         ]
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! ## Why a Dedicated Parser?
//! The payload is dynamically shaped: metadata is a name/value item
//! array, values are heterogeneous (numbers and strings), and failed
//! pushes omit the metadata entirely. Modelling it as explicit optional
//! fields means a malformed payload fails parsing loudly instead of
//! producing nulls deep inside reconciliation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Wire Types
// =============================================================================

/// Top-level callback envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

/// The callback proper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    /// 0 = success, anything else is a failure code.
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
    /// Present on success only.
    #[serde(rename = "CallbackMetadata")]
    pub metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

/// One name/value pair from the metadata array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    /// Heterogeneous: Amount is a number, receipt is a string, phone is
    /// a number.
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

// =============================================================================
// Summary
// =============================================================================

/// The fields reconciliation actually needs, extracted and normalised.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackSummary {
    pub checkout_request_id: Option<String>,
    pub merchant_request_id: Option<String>,
    pub result_code: i64,
    pub result_desc: Option<String>,
    /// Settled amount converted to cents.
    pub amount_cents: Option<i64>,
    /// Provider receipt number (MpesaReceiptNumber).
    pub receipt: Option<String>,
    pub phone: Option<String>,
}

impl CallbackSummary {
    /// ResultCode 0 means the payer authorised the push.
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// Parse failure: the payload did not carry the expected envelope.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("callback payload has no Body.stkCallback: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parses a raw callback payload into a [`CallbackSummary`].
///
/// ## Errors
/// Returns [`CallbackError::Malformed`] when the envelope is absent or
/// the wrong shape. Missing metadata items are NOT an error - a failed
/// push legitimately has none.
pub fn parse_callback(payload: &Value) -> Result<CallbackSummary, CallbackError> {
    let envelope: StkCallbackEnvelope = serde_json::from_value(payload.clone())?;
    let cb = envelope.body.stk_callback;

    let find = |name: &str| -> Option<Value> {
        cb.metadata
            .as_ref()?
            .items
            .iter()
            .find(|i| i.name == name)
            .and_then(|i| i.value.clone())
    };

    let amount_cents = find("Amount").and_then(|v| value_to_cents(&v));
    let receipt = find("MpesaReceiptNumber").and_then(|v| value_to_string(&v));
    let phone = find("PhoneNumber").and_then(|v| value_to_string(&v));

    Ok(CallbackSummary {
        checkout_request_id: cb.checkout_request_id,
        merchant_request_id: cb.merchant_request_id,
        result_code: cb.result_code,
        result_desc: cb.result_desc,
        amount_cents,
        receipt,
        phone,
    })
}

/// Converts a metadata amount (whole currency units, possibly
/// fractional, possibly a string) to cents.
fn value_to_cents(value: &Value) -> Option<i64> {
    let units = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some((units * 100.0).round() as i64)
}

/// Renders a metadata value as a string (phone numbers arrive as JSON
/// numbers).
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
