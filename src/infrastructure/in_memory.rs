use crate::domain::candidate::Candidate;
use crate::domain::ledger::{
    DonationRecord, NewDonation, NewVote, RecordKind, RecordRef, SENT_MESSAGE, SettleOutcome,
    TransactionStatus, VoteRecord,
};
use crate::domain::ports::{CandidateDirectory, LedgerStore, SessionStore};
use crate::domain::session::Session;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::RwLock;

/// A thread-safe in-memory store for USSD sessions.
///
/// Uses `Arc<RwLock<HashMap<String, Session>>>` to allow shared concurrent access.
/// Sessions live as long as the process, which is what the gateway's short
/// dialogs need.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    /// Creates a new, empty in-memory session store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn store(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }
}

#[derive(Default)]
struct Ledger {
    votes: BTreeMap<u64, VoteRecord>,
    donations: BTreeMap<u64, DonationRecord>,
    next_vote_id: u64,
    next_donation_id: u64,
}

/// A thread-safe in-memory vote and donation ledger.
///
/// Both tables sit behind one lock so that `settle` is a single
/// compare-and-set. Ids start at 1 and are never reused.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    ledger: Arc<RwLock<Ledger>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_vote(&self, vote: NewVote) -> Result<VoteRecord> {
        let mut ledger = self.ledger.write().await;
        ledger.next_vote_id += 1;
        let record = VoteRecord::from_new(ledger.next_vote_id, vote);
        ledger.votes.insert(record.id, record.clone());
        Ok(record)
    }

    async fn create_donation(&self, donation: NewDonation) -> Result<DonationRecord> {
        let mut ledger = self.ledger.write().await;
        ledger.next_donation_id += 1;
        let record = DonationRecord::from_new(ledger.next_donation_id, donation);
        ledger.donations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn vote(&self, id: u64) -> Result<Option<VoteRecord>> {
        Ok(self.ledger.read().await.votes.get(&id).cloned())
    }

    async fn donation(&self, id: u64) -> Result<Option<DonationRecord>> {
        Ok(self.ledger.read().await.donations.get(&id).cloned())
    }

    async fn votes(&self) -> Result<Vec<VoteRecord>> {
        Ok(self.ledger.read().await.votes.values().cloned().collect())
    }

    async fn donations(&self) -> Result<Vec<DonationRecord>> {
        Ok(self.ledger.read().await.donations.values().cloned().collect())
    }

    async fn mark_sent(&self, record: RecordRef, transaction_id: &str) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        let now = Utc::now();
        match record.kind {
            RecordKind::Vote => {
                if let Some(vote) = ledger.votes.get_mut(&record.id) {
                    vote.payment.mark_sent(transaction_id, SENT_MESSAGE);
                    vote.updated_at = now;
                }
            }
            RecordKind::Donation => {
                if let Some(donation) = ledger.donations.get_mut(&record.id) {
                    donation.payment.mark_sent(transaction_id, SENT_MESSAGE);
                    donation.updated_at = now;
                }
            }
        }
        Ok(())
    }

    async fn settle(
        &self,
        record: RecordRef,
        status: TransactionStatus,
        message: &str,
    ) -> Result<SettleOutcome> {
        let mut ledger = self.ledger.write().await;
        let now = Utc::now();
        let outcome = match record.kind {
            RecordKind::Vote => match ledger.votes.get_mut(&record.id) {
                Some(vote) => {
                    let outcome = vote.payment.settle(status, message)?;
                    if outcome == SettleOutcome::Applied {
                        vote.updated_at = now;
                    }
                    outcome
                }
                None => SettleOutcome::NotFound,
            },
            RecordKind::Donation => match ledger.donations.get_mut(&record.id) {
                Some(donation) => {
                    let outcome = donation.payment.settle(status, message)?;
                    if outcome == SettleOutcome::Applied {
                        donation.updated_at = now;
                    }
                    outcome
                }
                None => SettleOutcome::NotFound,
            },
        };
        Ok(outcome)
    }
}

/// Candidate list held in memory, seeded at startup.
///
/// `insert` is synchronous so seeding does not need a runtime.
#[derive(Default, Clone)]
pub struct InMemoryCandidateDirectory {
    candidates: Arc<StdRwLock<HashMap<String, Candidate>>>,
}

impl InMemoryCandidateDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, candidate: Candidate) {
        let mut candidates = self
            .candidates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        candidates.insert(candidate.code.clone(), candidate);
    }

    pub fn len(&self) -> usize {
        self.candidates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Candidate> for InMemoryCandidateDirectory {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        let directory = Self::new();
        for candidate in iter {
            directory.insert(candidate);
        }
        directory
    }
}

#[async_trait]
impl CandidateDirectory for InMemoryCandidateDirectory {
    async fn find_active_by_code(&self, code: &str) -> Result<Option<Candidate>> {
        let candidates = self
            .candidates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(candidates
            .get(code.trim())
            .filter(|candidate| candidate.is_active)
            .cloned())
    }
}
