use super::ledger::RecordRef;
use crate::error::{Result, UssdError};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

/// Processing code for a mobile-money debit.
pub const PROCESSING_CODE: &str = "000200";

pub const TRANSACTION_ID_LEN: usize = 14;

const REQUEST_ID_LEN: usize = 19;

/// Body of the outbound payment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    pub amount: String,
    pub processing_code: String,
    pub transaction_id: String,
    pub desc: String,
    pub merchant_id: String,
    pub subscriber_number: String,
    #[serde(rename = "r-switch")]
    pub r_switch: String,
    pub callback_url: String,
    pub reference: String,
    /// JSON-encoded [`MerchantData`]; the gateway echoes it in the callback.
    pub merchant_data: String,
}

/// Correlation payload embedded in the payment request. The record id in
/// here, not the transaction id, is what the callback is matched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MerchantData {
    Vote {
        session_id: String,
        vote_id: u64,
        vote_quantity: u32,
        candidate_name: String,
    },
    Donation {
        session_id: String,
        donation_id: u64,
    },
}

impl MerchantData {
    pub fn record_ref(&self) -> RecordRef {
        match self {
            Self::Vote { vote_id, .. } => RecordRef::vote(*vote_id),
            Self::Donation { donation_id, .. } => RecordRef::donation(*donation_id),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| UssdError::ReconciliationError(format!("Bad merchant_data: {e}")))
    }
}

/// Payload the gateway posts back once the subscriber approved or declined.
/// Field names vary between gateway revisions, so everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub merchant_data: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subscriber_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_amount: Option<String>,
}

impl CallbackPayload {
    /// Empty strings count as absent.
    pub fn gateway_status(&self) -> Option<&str> {
        self.status
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.transaction_status.as_deref())
    }

    pub fn gateway_message(&self) -> &str {
        self.message
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.description.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or("Payment processed")
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Builds a transaction id from the tail of the session id, the millisecond
/// clock and four random digits, cut to [`TRANSACTION_ID_LEN`] characters.
pub fn correlation_id(session_id: &str, now_millis: i64, random: u16) -> String {
    let chars: Vec<char> = session_id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(6)..].iter().collect();
    let clock = now_millis.rem_euclid(1_000_000);
    format!("{tail:0>6}{clock:06}{random:04}")
        .chars()
        .take(TRANSACTION_ID_LEN)
        .collect()
}

pub fn generate_correlation_id(session_id: &str) -> String {
    let random = rand::thread_rng().gen_range(1000..=9999);
    correlation_id(session_id, Utc::now().timestamp_millis(), random)
}

/// Value of the `request-id` header: the millisecond clock padded to 19 digits.
pub fn request_id(now_millis: i64) -> String {
    format!("{now_millis:0<REQUEST_ID_LEN$}")
}
