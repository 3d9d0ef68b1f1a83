use super::candidate::Candidate;
use super::money::Amount;
use super::network::Carrier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of [`Menu`], used for back-navigation bookkeeping and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MenuStateKind {
    MainMenu,
    EnterGroupCode,
    EnterVoteCount,
    ConfirmVotePayment,
    EnterMomoPin,
    DonateFlow,
    EnterDonationAmount,
    ConfirmDonation,
}

impl MenuStateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MainMenu => "MAIN_MENU",
            Self::EnterGroupCode => "ENTER_GROUP_CODE",
            Self::EnterVoteCount => "ENTER_VOTE_COUNT",
            Self::ConfirmVotePayment => "CONFIRM_VOTE_PAYMENT",
            Self::EnterMomoPin => "ENTER_MOMO_PIN",
            Self::DonateFlow => "DONATE_FLOW",
            Self::EnterDonationAmount => "ENTER_DONATION_AMOUNT",
            Self::ConfirmDonation => "CONFIRM_DONATION",
        }
    }
}

impl fmt::Display for MenuStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The candidate picked in ENTER_GROUP_CODE, copied out of the directory so
/// later states do not depend on it staying active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateChoice {
    pub id: u64,
    pub name: String,
    pub code: String,
}

impl From<&Candidate> for CandidateChoice {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name.clone(),
            code: candidate.code.clone(),
        }
    }
}

/// Everything needed to record and charge a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOrder {
    pub candidate: CandidateChoice,
    pub votes: u32,
    pub amount: Amount,
}

/// Current menu position together with the flow data collected so far.
///
/// Each variant carries only what its state needs; moving forward in a flow
/// carries the earlier fields along, and resetting to `MainMenu` drops them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Menu {
    MainMenu,
    EnterGroupCode,
    EnterVoteCount { candidate: CandidateChoice },
    ConfirmVotePayment { order: VoteOrder },
    EnterMomoPin { order: VoteOrder },
    DonateFlow,
    EnterDonationAmount,
    ConfirmDonation { amount: Amount },
}

impl Menu {
    pub fn kind(&self) -> MenuStateKind {
        match self {
            Self::MainMenu => MenuStateKind::MainMenu,
            Self::EnterGroupCode => MenuStateKind::EnterGroupCode,
            Self::EnterVoteCount { .. } => MenuStateKind::EnterVoteCount,
            Self::ConfirmVotePayment { .. } => MenuStateKind::ConfirmVotePayment,
            Self::EnterMomoPin { .. } => MenuStateKind::EnterMomoPin,
            Self::DonateFlow => MenuStateKind::DonateFlow,
            Self::EnterDonationAmount => MenuStateKind::EnterDonationAmount,
            Self::ConfirmDonation { .. } => MenuStateKind::ConfirmDonation,
        }
    }
}

/// One subscriber's menu dialog, keyed by the gateway's session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub msisdn: String,
    pub user_id: Option<String>,
    pub network: Option<String>,
    pub menu: Menu,
    pub prev_menu_state: Option<MenuStateKind>,
    /// Set once a terminal response was sent.
    #[serde(default)]
    pub closed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn open(
        session_id: impl Into<String>,
        msisdn: impl Into<String>,
        user_id: Option<String>,
        network: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            msisdn: msisdn.into(),
            user_id,
            network,
            menu: Menu::MainMenu,
            prev_menu_state: None,
            closed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn carrier(&self) -> Carrier {
        Carrier::from_network(self.network.as_deref())
    }

    pub fn payer(&self) -> Payer {
        Payer {
            session_id: self.session_id.clone(),
            msisdn: self.msisdn.clone(),
            network: self.network.clone(),
        }
    }
}

/// The subset of a session the payment gateway client needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payer {
    pub session_id: String,
    pub msisdn: String,
    pub network: Option<String>,
}

impl Payer {
    pub fn carrier(&self) -> Carrier {
        Carrier::from_network(self.network.as_deref())
    }
}
