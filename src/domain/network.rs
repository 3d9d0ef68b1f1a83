use serde::{Deserialize, Serialize};

/// Mobile network operators the payment switch can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Carrier {
    #[default]
    Mtn,
    Vodafone,
    AirtelTigo,
    Tigo,
}

impl Carrier {
    /// Maps the carrier name sent by the USSD gateway. Unknown or missing names
    /// route through MTN.
    pub fn from_network(network: Option<&str>) -> Self {
        let Some(name) = network else {
            return Self::default();
        };
        match name.trim().to_ascii_uppercase().as_str() {
            "VODAFONE" | "TELECEL" => Self::Vodafone,
            "AIRTEL" | "AIRTELTIGO" => Self::AirtelTigo,
            "TIGO" => Self::Tigo,
            _ => Self::Mtn,
        }
    }

    /// Value of the `r-switch` field in the payment request.
    pub fn switch_code(self) -> &'static str {
        match self {
            Self::Mtn => "MTN",
            Self::Vodafone => "VDF",
            Self::AirtelTigo => "ATL",
            Self::Tigo => "TGO",
        }
    }

    /// Short code the subscriber dials to approve a pending payment.
    pub fn approval_dial_code(self) -> &'static str {
        match self {
            Self::Mtn => "*170#",
            _ => "*110#",
        }
    }
}
