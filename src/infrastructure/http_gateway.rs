use crate::domain::payment::{PaymentRequest, request_id};
use crate::domain::ports::PaymentGateway;
use crate::error::{Result, UssdError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::CACHE_CONTROL;
use tracing::debug;

/// Basic-auth credentials for the merchant API.
#[derive(Clone)]
pub struct GatewayCredentials {
    pub api_name: String,
    pub api_key: String,
}

/// Posts payment requests to the mobile-money gateway over HTTPS.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    url: String,
    credentials: GatewayCredentials,
}

impl HttpPaymentGateway {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        credentials: GatewayCredentials,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            credentials,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn submit(&self, request: &PaymentRequest) -> Result<()> {
        debug!(
            transaction_id = %request.transaction_id,
            r_switch = %request.r_switch,
            "sending payment request"
        );
        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.credentials.api_name, Some(&self.credentials.api_key))
            .header(CACHE_CONTROL, "no-cache")
            .header("request-id", request_id(Utc::now().timestamp_millis()))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(UssdError::GatewayRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
