use crate::domain::candidate::Candidate;
use crate::domain::ledger::{
    DonationRecord, NewDonation, NewVote, RecordKind, RecordRef, SENT_MESSAGE, SettleOutcome,
    TransactionStatus, VoteRecord,
};
use crate::domain::ports::{CandidateDirectory, LedgerStore, SessionStore};
use crate::domain::session::Session;
use crate::error::{Result, UssdError};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing USSD sessions, keyed by session id.
pub const CF_SESSIONS: &str = "sessions";
/// Column Family for vote records, keyed by big-endian id.
pub const CF_VOTES: &str = "votes";
/// Column Family for donation records, keyed by big-endian id.
pub const CF_DONATIONS: &str = "donations";
/// Column Family for the candidate directory, keyed by code.
pub const CF_CANDIDATES: &str = "candidates";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

const NEXT_VOTE_ID: &[u8] = b"next_vote_id";
const NEXT_DONATION_ID: &[u8] = b"next_donation_id";

/// A persistent store implementation using RocksDB.
///
/// Sessions, both ledger tables and the candidate directory live in separate
/// Column Families of one database. Values are JSON.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
/// Read-modify-write paths (id allocation, `mark_sent`, `settle`) run under
/// one async mutex so that settlement stays a compare-and-set.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every column family the store uses exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_SESSIONS, CF_VOTES, CF_DONATIONS, CF_CANDIDATES, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Adds or replaces a candidate, keyed by its code.
    pub fn put_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.put(CF_CANDIDATES, candidate.code.as_bytes(), candidate)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            UssdError::InternalError(Box::new(std::io::Error::other(format!(
                "Column family '{name}' not found"
            ))))
        })
    }

    fn put<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let handle = self.cf(cf)?;
        self.db.put_cf(handle, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf(cf)?;
        match self.db.get_cf(handle, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_all<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let handle = self.cf(cf)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    /// Caller must hold `write_lock`.
    fn next_id(&self, sequence: &[u8]) -> Result<u64> {
        let handle = self.cf(CF_META)?;
        let current = match self.db.get_cf(handle, sequence)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    UssdError::InternalError(Box::new(std::io::Error::other(
                        "Corrupt id sequence",
                    )))
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        self.db.put_cf(handle, sequence, next.to_be_bytes())?;
        Ok(next)
    }
}

#[async_trait]
impl SessionStore for RocksDBStore {
    async fn store(&self, session: Session) -> Result<()> {
        self.put(CF_SESSIONS, session.session_id.as_bytes(), &session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        self.load(CF_SESSIONS, session_id.as_bytes())
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn create_vote(&self, vote: NewVote) -> Result<VoteRecord> {
        let _guard = self.write_lock.lock().await;
        let record = VoteRecord::from_new(self.next_id(NEXT_VOTE_ID)?, vote);
        self.put(CF_VOTES, &record.id.to_be_bytes(), &record)?;
        Ok(record)
    }

    async fn create_donation(&self, donation: NewDonation) -> Result<DonationRecord> {
        let _guard = self.write_lock.lock().await;
        let record = DonationRecord::from_new(self.next_id(NEXT_DONATION_ID)?, donation);
        self.put(CF_DONATIONS, &record.id.to_be_bytes(), &record)?;
        Ok(record)
    }

    async fn vote(&self, id: u64) -> Result<Option<VoteRecord>> {
        self.load(CF_VOTES, &id.to_be_bytes())
    }

    async fn donation(&self, id: u64) -> Result<Option<DonationRecord>> {
        self.load(CF_DONATIONS, &id.to_be_bytes())
    }

    async fn votes(&self) -> Result<Vec<VoteRecord>> {
        self.load_all(CF_VOTES)
    }

    async fn donations(&self) -> Result<Vec<DonationRecord>> {
        self.load_all(CF_DONATIONS)
    }

    async fn mark_sent(&self, record: RecordRef, transaction_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = record.id.to_be_bytes();
        match record.kind {
            RecordKind::Vote => {
                if let Some(mut vote) = self.load::<VoteRecord>(CF_VOTES, &key)? {
                    vote.payment.mark_sent(transaction_id, SENT_MESSAGE);
                    vote.updated_at = Utc::now();
                    self.put(CF_VOTES, &key, &vote)?;
                }
            }
            RecordKind::Donation => {
                if let Some(mut donation) = self.load::<DonationRecord>(CF_DONATIONS, &key)? {
                    donation.payment.mark_sent(transaction_id, SENT_MESSAGE);
                    donation.updated_at = Utc::now();
                    self.put(CF_DONATIONS, &key, &donation)?;
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
        let _guard = self.write_lock.lock().await;
        let key = record.id.to_be_bytes();
        match record.kind {
            RecordKind::Vote => {
                let Some(mut vote) = self.load::<VoteRecord>(CF_VOTES, &key)? else {
                    return Ok(SettleOutcome::NotFound);
                };
                let outcome = vote.payment.settle(status, message)?;
                if outcome == SettleOutcome::Applied {
                    vote.updated_at = Utc::now();
                    self.put(CF_VOTES, &key, &vote)?;
                }
                Ok(outcome)
            }
            RecordKind::Donation => {
                let Some(mut donation) = self.load::<DonationRecord>(CF_DONATIONS, &key)? else {
                    return Ok(SettleOutcome::NotFound);
                };
                let outcome = donation.payment.settle(status, message)?;
                if outcome == SettleOutcome::Applied {
                    donation.updated_at = Utc::now();
                    self.put(CF_DONATIONS, &key, &donation)?;
                }
                Ok(outcome)
            }
        }
    }
}

#[async_trait]
impl CandidateDirectory for RocksDBStore {
    async fn find_active_by_code(&self, code: &str) -> Result<Option<Candidate>> {
        Ok(self
            .load::<Candidate>(CF_CANDIDATES, code.trim().as_bytes())?
            .filter(|candidate| candidate.is_active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::domain::session::{CandidateChoice, Menu, MenuStateKind};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn new_vote() -> NewVote {
        NewVote {
            candidate_id: 1,
            voter_phone: "233241234567".to_string(),
            number_of_votes: 5,
            amount_paid: Amount::new(dec!(5)).unwrap(),
            transaction_id: "12345612345612".to_string(),
            session_id: "S1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in [CF_SESSIONS, CF_VOTES, CF_DONATIONS, CF_CANDIDATES, CF_META] {
            assert!(store.db.cf_handle(name).is_some(), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_rocksdb_session_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let mut session = Session::open("S1", "233241234567", None, Some("MTN".into()));
        session.menu = Menu::EnterVoteCount {
            candidate: CandidateChoice {
                id: 1,
                name: "Elikem Group".into(),
                code: "013".into(),
            },
        };
        session.prev_menu_state = Some(MenuStateKind::EnterGroupCode);
        SessionStore::store(&store, session.clone()).await.unwrap();

        let retrieved = SessionStore::get(&store, "S1").await.unwrap().unwrap();
        assert_eq!(retrieved, session);
        assert!(SessionStore::get(&store, "S2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_ledger_settle_and_sequences() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let first = store.create_vote(new_vote()).await.unwrap();
        let second = store.create_vote(new_vote()).await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let record = first.record_ref();
        store.mark_sent(record, "98765498765499").await.unwrap();
        assert_eq!(
            store
                .settle(record, TransactionStatus::Success, "Approved")
                .await
                .unwrap(),
            SettleOutcome::Applied
        );
        assert_eq!(
            store
                .settle(record, TransactionStatus::Failed, "late")
                .await
                .unwrap(),
            SettleOutcome::AlreadyFinal(TransactionStatus::Success)
        );

        let stored = store.vote(first.id).await.unwrap().unwrap();
        assert_eq!(stored.payment.transaction_id, "98765498765499");
        assert_eq!(stored.payment.transaction_message.as_deref(), Some("Approved"));
        assert_eq!(store.votes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rocksdb_candidates() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        store
            .put_candidate(&Candidate::new(1, "Elikem Group", "013"))
            .unwrap();
        let mut retired = Candidate::new(2, "Retired Troupe", "099");
        retired.is_active = false;
        store.put_candidate(&retired).unwrap();

        assert!(store.find_active_by_code("013").await.unwrap().is_some());
        assert!(store.find_active_by_code("099").await.unwrap().is_none());
    }
}
