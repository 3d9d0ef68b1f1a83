use crate::application::menu::MenuConfig;
use crate::application::payments::PaymentSettings;
use crate::application::reconciler::ReconcilerSettings;
use crate::domain::money::Amount;
use crate::error::{Result, UssdError};
use std::{env, fmt::Display, str::FromStr, time::Duration};
use tracing::{info, warn};

pub const DEFAULT_CAMPAIGN: &str = "Borbor Carnival 25";
pub const DEFAULT_SMS_URL: &str =
    "https://sms.nalosolutions.com/smsbackend/Resl_Nalo/send-message/";

/// Runtime settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub campaign: String,
    pub payment_url: String,
    pub payment_api_name: String,
    pub payment_api_key: String,
    pub merchant_id: String,
    pub callback_url: String,
    pub approved_status: String,
    pub dispatch_delay: Duration,
    pub sms_url: String,
    pub sms_api_key: String,
    pub sms_sender_id: String,
    pub admin_phone: Option<String>,
    pub legacy_pin_capture: bool,
    pub vote_ceiling: u32,
    pub donation_ceiling: Amount,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source { lookup };
        Ok(Self {
            port: source.try_load("PORT", "3000")?,
            campaign: source.try_load("CAMPAIGN_NAME", DEFAULT_CAMPAIGN)?,
            payment_url: source.required("PAYMENT_URL")?,
            payment_api_name: source.required("PAYMENT_API_NAME")?,
            payment_api_key: source.required("PAYMENT_API_KEY")?,
            merchant_id: source.required("MERCHANT_ID")?,
            callback_url: source.required("PAYMENT_CALLBACK_URL")?,
            approved_status: source.try_load("PAYMENT_APPROVED_STATUS", "approved")?,
            dispatch_delay: Duration::from_millis(
                source.try_load("PAYMENT_DISPATCH_DELAY_MS", "2000")?,
            ),
            sms_url: source.try_load("SMS_URL", DEFAULT_SMS_URL)?,
            sms_api_key: source.required("SMS_API_KEY")?,
            sms_sender_id: source.try_load("SMS_SENDER_ID", "Borborbor")?,
            admin_phone: source.optional("ADMIN_PHONE_NUMBER"),
            legacy_pin_capture: source.try_load("LEGACY_PIN_CAPTURE", "false")?,
            vote_ceiling: source.try_load("VOTE_CEILING", "1000")?,
            donation_ceiling: source.try_load("DONATION_CEILING", "1000")?,
        })
    }

    pub fn menu(&self) -> MenuConfig {
        MenuConfig {
            campaign: self.campaign.clone(),
            vote_ceiling: self.vote_ceiling,
            donation_ceiling: self.donation_ceiling,
            legacy_pin_capture: self.legacy_pin_capture,
            ..MenuConfig::default()
        }
    }

    pub fn payments(&self) -> PaymentSettings {
        PaymentSettings {
            merchant_id: self.merchant_id.clone(),
            callback_url: self.callback_url.clone(),
            campaign: self.campaign.clone(),
        }
    }

    pub fn reconciler(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            approved_status: self.approved_status.clone(),
            admin_phone: self.admin_phone.clone(),
            campaign: self.campaign.clone(),
        }
    }
}

struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn try_load<T: FromStr>(&self, key: &str, default: &str) -> Result<T>
    where
        T::Err: Display,
    {
        self.var(key)
            .unwrap_or_else(|| {
                info!("{key} not set, using default: {default}");
                default.to_string()
            })
            .parse()
            .map_err(|e| UssdError::ConfigError(format!("Invalid {key} value: {e}")))
    }

    fn required(&self, key: &str) -> Result<String> {
        self.var(key)
            .ok_or_else(|| UssdError::ConfigError(format!("{key} must be set")))
    }

    fn optional(&self, key: &str) -> Option<String> {
        let value = self.var(key);
        if value.is_none() {
            warn!("{key} not set");
        }
        value
    }
}
