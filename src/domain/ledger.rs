use super::money::Amount;
use crate::error::UssdError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message stamped on a record once the gateway accepted the payment request.
pub const SENT_MESSAGE: &str = "Payment request sent successfully";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Vote,
    Donation,
}

/// Addresses one ledger row. This is what the gateway echoes back to us
/// inside `merchant_data`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub id: u64,
}

impl RecordRef {
    pub fn vote(id: u64) -> Self {
        Self {
            kind: RecordKind::Vote,
            id,
        }
    }

    pub fn donation(id: u64) -> Self {
        Self {
            kind: RecordKind::Donation,
            id,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RecordKind::Vote => write!(f, "vote#{}", self.id),
            RecordKind::Donation => write!(f, "donation#{}", self.id),
        }
    }
}

/// Result of asking the ledger to finalize a record.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SettleOutcome {
    Applied,
    /// The record had already left `pending`; nothing was written.
    AlreadyFinal(TransactionStatus),
    NotFound,
}

/// Payment lifecycle fields shared by votes and donations.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct PaymentState {
    pub transaction_id: String,
    pub transaction_status: TransactionStatus,
    pub transaction_message: Option<String>,
}

impl PaymentState {
    pub fn pending(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            transaction_status: TransactionStatus::Pending,
            transaction_message: None,
        }
    }

    /// Moves a pending payment to a terminal status. Terminal records are never
    /// touched again, which makes duplicate callbacks harmless.
    pub fn settle(
        &mut self,
        status: TransactionStatus,
        message: impl Into<String>,
    ) -> Result<SettleOutcome, UssdError> {
        if !status.is_terminal() {
            return Err(UssdError::ValidationError(
                "A payment can only settle to success or failed".to_string(),
            ));
        }
        if self.transaction_status.is_terminal() {
            return Ok(SettleOutcome::AlreadyFinal(self.transaction_status));
        }
        self.transaction_status = status;
        self.transaction_message = Some(message.into());
        Ok(SettleOutcome::Applied)
    }

    /// Records that the gateway accepted the request. A callback may already
    /// have settled the record, in which case its message is kept.
    pub fn mark_sent(&mut self, transaction_id: impl Into<String>, message: impl Into<String>) {
        self.transaction_id = transaction_id.into();
        if !self.transaction_status.is_terminal() {
            self.transaction_message = Some(message.into());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVote {
    pub candidate_id: u64,
    pub voter_phone: String,
    pub number_of_votes: u32,
    pub amount_paid: Amount,
    pub transaction_id: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct VoteRecord {
    pub id: u64,
    pub candidate_id: u64,
    pub voter_phone: String,
    pub number_of_votes: u32,
    pub amount_paid: Amount,
    #[serde(flatten)]
    pub payment: PaymentState,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn from_new(id: u64, vote: NewVote) -> Self {
        let now = Utc::now();
        Self {
            id,
            candidate_id: vote.candidate_id,
            voter_phone: vote.voter_phone,
            number_of_votes: vote.number_of_votes,
            amount_paid: vote.amount_paid,
            payment: PaymentState::pending(vote.transaction_id),
            session_id: vote.session_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_ref(&self) -> RecordRef {
        RecordRef::vote(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDonation {
    pub donor_phone: String,
    pub amount: Amount,
    pub transaction_id: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct DonationRecord {
    pub id: u64,
    pub donor_phone: String,
    pub amount: Amount,
    #[serde(flatten)]
    pub payment: PaymentState,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DonationRecord {
    pub fn from_new(id: u64, donation: NewDonation) -> Self {
        let now = Utc::now();
        Self {
            id,
            donor_phone: donation.donor_phone,
            amount: donation.amount,
            payment: PaymentState::pending(donation.transaction_id),
            session_id: donation.session_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_ref(&self) -> RecordRef {
        RecordRef::donation(self.id)
    }
}
