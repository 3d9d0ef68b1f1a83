use crate::domain::ledger::{RecordKind, RecordRef, SettleOutcome, TransactionStatus};
use crate::domain::money::CURRENCY;
use crate::domain::payment::{CallbackPayload, MerchantData};
use crate::domain::ports::{LedgerStoreRef, NotifierBox};
use crate::error::{Result, UssdError};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Gateway status value, compared case-insensitively, that means success.
    pub approved_status: String,
    pub admin_phone: Option<String>,
    pub campaign: String,
}

/// What a callback did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Settled {
        record: RecordRef,
        status: TransactionStatus,
    },
    /// The record was already final; nothing changed and nobody was notified.
    Duplicate {
        record: RecordRef,
        status: TransactionStatus,
    },
    /// The callback referenced a record we do not have.
    Unmatched(RecordRef),
}

/// Applies gateway callbacks to the ledger and sends the follow-up SMS.
pub struct CallbackReconciler {
    ledger: LedgerStoreRef,
    notifier: NotifierBox,
    settings: ReconcilerSettings,
}

impl CallbackReconciler {
    pub fn new(
        ledger: LedgerStoreRef,
        notifier: NotifierBox,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            ledger,
            notifier,
            settings,
        }
    }

    pub fn is_approved(&self, status: Option<&str>) -> bool {
        status.is_some_and(|s| s.trim().eq_ignore_ascii_case(&self.settings.approved_status))
    }

    pub async fn reconcile(&self, payload: &CallbackPayload) -> Result<Reconciliation> {
        let raw = payload.merchant_data.as_deref().ok_or_else(|| {
            UssdError::ReconciliationError("Callback carries no merchant_data".to_string())
        })?;
        let data = MerchantData::decode(raw)?;
        let record = data.record_ref();

        let status = if self.is_approved(payload.gateway_status()) {
            TransactionStatus::Success
        } else {
            TransactionStatus::Failed
        };

        match self
            .ledger
            .settle(record, status, payload.gateway_message())
            .await?
        {
            SettleOutcome::Applied => {
                info!(%record, %status, "payment settled");
            }
            SettleOutcome::AlreadyFinal(previous) => {
                info!(%record, %previous, "duplicate callback ignored");
                return Ok(Reconciliation::Duplicate {
                    record,
                    status: previous,
                });
            }
            SettleOutcome::NotFound => {
                warn!(%record, "callback for unknown record");
                return Ok(Reconciliation::Unmatched(record));
            }
        }

        self.notify(&data, record, status, payload).await?;
        Ok(Reconciliation::Settled { record, status })
    }

    async fn notify(
        &self,
        data: &MerchantData,
        record: RecordRef,
        status: TransactionStatus,
        payload: &CallbackPayload,
    ) -> Result<()> {
        let (payer, amount) = match record.kind {
            RecordKind::Vote => match self.ledger.vote(record.id).await? {
                Some(vote) => (vote.voter_phone, vote.amount_paid.to_string()),
                None => return Ok(()),
            },
            RecordKind::Donation => match self.ledger.donation(record.id).await? {
                Some(donation) => (donation.donor_phone, donation.amount.to_string()),
                None => return Ok(()),
            },
        };
        let payer = payload
            .subscriber_number
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or(payer);
        let total = payload
            .total_amount
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or(amount);

        let approved = status == TransactionStatus::Success;
        let (payer_text, admin_text) = match data {
            MerchantData::Vote {
                vote_quantity,
                candidate_name,
                ..
            } if approved => (
                format!("Thank you for voting {vote_quantity} times for {candidate_name}."),
                Some(format!(
                    "Vote payment successful: {vote_quantity} votes for {candidate_name} from {payer} - Amount: {CURRENCY}{total}"
                )),
            ),
            MerchantData::Vote { candidate_name, .. } => (
                format!("Your vote for {candidate_name} was not successful. Please try again."),
                None,
            ),
            MerchantData::Donation { .. } if approved => (
                format!(
                    "Thank you for donating {CURRENCY}{total} to {}.",
                    self.settings.campaign
                ),
                Some(format!("Donation by: {payer}. Amount: {CURRENCY}{total}")),
            ),
            MerchantData::Donation { .. } => (
                "Your donation was not successful. Please try again.".to_string(),
                None,
            ),
        };

        self.deliver(&payer, &payer_text).await;
        if let (Some(text), Some(admin)) = (admin_text, self.settings.admin_phone.as_deref()) {
            self.deliver(admin, &text).await;
        }
        Ok(())
    }

    /// SMS failures never undo a settlement.
    async fn deliver(&self, msisdn: &str, message: &str) {
        if let Err(e) = self.notifier.send(msisdn, message).await {
            warn!(%msisdn, "sms delivery failed: {e}");
        }
    }
}
