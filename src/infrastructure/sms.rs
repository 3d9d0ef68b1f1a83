use crate::domain::ports::Notifier;
use crate::error::{Result, UssdError};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct SmsMessage<'a> {
    key: &'a str,
    msisdn: &'a str,
    message: &'a str,
    sender_id: &'a str,
}

/// Sends SMS through the bulk-SMS provider's send-message endpoint.
#[derive(Clone)]
pub struct SmsNotifier {
    client: reqwest::Client,
    url: String,
    api_key: String,
    sender_id: String,
}

impl SmsNotifier {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        api_key: impl Into<String>,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            sender_id: sender_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, msisdn: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&SmsMessage {
                key: &self.api_key,
                msisdn,
                message,
                sender_id: &self.sender_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UssdError::GatewayRejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(%msisdn, "sms sent");
        Ok(())
    }
}
