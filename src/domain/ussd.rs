use crate::error::{Result, UssdError};
use serde::{Deserialize, Deserializer, Serialize};

/// One hop of the dialog as posted by the USSD gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UssdRequest {
    #[serde(rename = "SESSIONID", default)]
    pub session_id: Option<String>,
    #[serde(rename = "USERID", default)]
    pub user_id: Option<String>,
    #[serde(rename = "MSISDN", default)]
    pub msisdn: Option<String>,
    #[serde(rename = "USERDATA", default)]
    pub user_data: Option<String>,
    #[serde(rename = "MSGTYPE", default, deserialize_with = "flag")]
    pub msg_type: Option<bool>,
    #[serde(rename = "NETWORK", default)]
    pub network: Option<String>,
}

impl UssdRequest {
    /// Checks the fields the driver cannot work without.
    pub fn validate(self) -> Result<DialRequest> {
        let session_id = self.session_id.filter(|s| !s.trim().is_empty());
        let msisdn = self.msisdn.filter(|s| !s.trim().is_empty());
        let (Some(session_id), Some(msisdn)) = (session_id, msisdn) else {
            return Err(UssdError::ValidationError(
                "Missing required fields".to_string(),
            ));
        };
        Ok(DialRequest {
            session_id,
            msisdn,
            user_id: self.user_id.filter(|s| !s.is_empty()),
            user_data: self.user_data.unwrap_or_default(),
            network: self.network.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// A request that passed [`UssdRequest::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialRequest {
    pub session_id: String,
    pub msisdn: String,
    pub user_id: Option<String>,
    pub user_data: String,
    pub network: Option<String>,
}

impl DialRequest {
    pub fn new(session_id: impl Into<String>, msisdn: impl Into<String>, input: &str) -> Self {
        Self {
            session_id: session_id.into(),
            msisdn: msisdn.into(),
            user_id: None,
            user_data: input.to_string(),
            network: None,
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn respond(&self, message: impl Into<String>, more_input: bool) -> UssdResponse {
        UssdResponse {
            user_id: self.user_id.clone().unwrap_or_default(),
            msisdn: self.msisdn.clone(),
            user_data: self.user_data.clone(),
            msg: message.into(),
            msg_type: more_input,
        }
    }
}

/// Reply to the gateway. `MSGTYPE` true keeps the session open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UssdResponse {
    #[serde(rename = "USERID")]
    pub user_id: String,
    #[serde(rename = "MSISDN")]
    pub msisdn: String,
    #[serde(rename = "USERDATA")]
    pub user_data: String,
    #[serde(rename = "MSG")]
    pub msg: String,
    #[serde(rename = "MSGTYPE")]
    pub msg_type: bool,
}

/// Gateways send MSGTYPE as a bool, as "true"/"1", or as a number.
fn flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::String(s)) => Some(s == "true" || s == "1"),
        Some(serde_json::Value::Number(n)) => Some(n.as_i64() == Some(1)),
        _ => None,
    })
}
