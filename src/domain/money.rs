use crate::error::UssdError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currency code shown to users in prompts and SMS texts.
pub const CURRENCY: &str = "GHS";

/// Smallest unit mobile money can charge is a pesewa.
pub const MAX_SCALE: u32 = 2;

/// Represents a positive monetary amount charged through mobile money.
///
/// This is a wrapper around `rust_decimal::Decimal` that enforces the payment
/// rules: strictly positive and at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ONE: Self = Self(Decimal::ONE);
    pub const ONE_THOUSAND: Self = Self(Decimal::ONE_THOUSAND);

    pub fn new(value: Decimal) -> Result<Self, UssdError> {
        if value <= Decimal::ZERO {
            return Err(UssdError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        if value.normalize().scale() > MAX_SCALE {
            return Err(UssdError::ValidationError(format!(
                "Amount must have at most {MAX_SCALE} decimal places"
            )));
        }
        Ok(Self(value))
    }

    /// Price of `units` items at `unit_price` each.
    pub fn for_units(units: u32, unit_price: Amount) -> Result<Self, UssdError> {
        Self::new(Decimal::from(units) * unit_price.0)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = UssdError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = UssdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| UssdError::ValidationError(format!("Not a number: {e}")))?;
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
