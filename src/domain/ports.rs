use super::candidate::Candidate;
use super::ledger::{
    DonationRecord, NewDonation, NewVote, RecordRef, SettleOutcome, TransactionStatus, VoteRecord,
};
use super::payment::PaymentRequest;
use super::session::Session;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn store(&self, session: Session) -> Result<()>;
    async fn get(&self, session_id: &str) -> Result<Option<Session>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_vote(&self, vote: NewVote) -> Result<VoteRecord>;
    async fn create_donation(&self, donation: NewDonation) -> Result<DonationRecord>;
    async fn vote(&self, id: u64) -> Result<Option<VoteRecord>>;
    async fn donation(&self, id: u64) -> Result<Option<DonationRecord>>;
    async fn votes(&self) -> Result<Vec<VoteRecord>>;
    async fn donations(&self) -> Result<Vec<DonationRecord>>;

    /// Stamps the gateway transaction id after the payment request went out.
    async fn mark_sent(&self, record: RecordRef, transaction_id: &str) -> Result<()>;

    /// The single status transition used by both the dispatch failure path
    /// and the callback reconciler. Must be a compare-and-set: only a pending
    /// record is updated.
    async fn settle(
        &self,
        record: RecordRef,
        status: TransactionStatus,
        message: &str,
    ) -> Result<SettleOutcome>;
}

/// Read-only view of the externally managed candidate list.
#[async_trait]
pub trait CandidateDirectory: Send + Sync {
    async fn find_active_by_code(&self, code: &str) -> Result<Option<Candidate>>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Sends one payment request. `Ok` means the gateway answered HTTP 200.
    async fn submit(&self, request: &PaymentRequest) -> Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, msisdn: &str, message: &str) -> Result<()>;
}

pub type SessionStoreRef = Arc<dyn SessionStore>;
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type CandidateDirectoryRef = Arc<dyn CandidateDirectory>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
pub type NotifierBox = Box<dyn Notifier>;
