use crate::domain::ledger::{NewDonation, RecordRef, SettleOutcome, TransactionStatus, VoteRecord};
use crate::domain::money::Amount;
use crate::domain::payment::{
    MerchantData, PROCESSING_CODE, PaymentRequest, generate_correlation_id,
};
use crate::domain::ports::{LedgerStoreRef, PaymentGatewayBox};
use crate::domain::session::Payer;
use crate::error::Result;
use tracing::{info, warn};

/// Message written to a record the worker never got to dispatch.
pub const CANCELLED_MESSAGE: &str = "Payment dispatch cancelled";

/// Merchant account details stamped on every outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSettings {
    pub merchant_id: String,
    pub callback_url: String,
    pub campaign: String,
}

/// A payment the session driver handed off for background dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentJob {
    /// The vote record already exists in `pending`.
    Vote {
        payer: Payer,
        vote: VoteRecord,
        candidate_name: String,
    },
    /// The donation record is created right before the request goes out.
    Donation { payer: Payer, amount: Amount },
}

impl PaymentJob {
    /// Ledger row affected by this job, if one exists yet.
    pub fn record_ref(&self) -> Option<RecordRef> {
        match self {
            Self::Vote { vote, .. } => Some(vote.record_ref()),
            Self::Donation { .. } => None,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::Vote { payer, .. } | Self::Donation { payer, .. } => &payer.session_id,
        }
    }
}

/// Builds payment requests, sends them through the gateway port and records
/// the outcome in the ledger.
pub struct PaymentClient {
    gateway: PaymentGatewayBox,
    ledger: LedgerStoreRef,
    settings: PaymentSettings,
}

impl PaymentClient {
    pub fn new(
        gateway: PaymentGatewayBox,
        ledger: LedgerStoreRef,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            gateway,
            ledger,
            settings,
        }
    }

    pub async fn execute(&self, job: PaymentJob) -> Result<()> {
        match job {
            PaymentJob::Vote {
                payer,
                vote,
                candidate_name,
            } => self.pay_for_vote(&payer, &vote, &candidate_name).await,
            PaymentJob::Donation { payer, amount } => {
                self.pay_for_donation(&payer, amount).await.map(|_| ())
            }
        }
    }

    pub fn vote_request(
        &self,
        payer: &Payer,
        vote: &VoteRecord,
        candidate_name: &str,
    ) -> Result<PaymentRequest> {
        let merchant_data = MerchantData::Vote {
            session_id: payer.session_id.clone(),
            vote_id: vote.id,
            vote_quantity: vote.number_of_votes,
            candidate_name: candidate_name.to_string(),
        };
        Ok(PaymentRequest {
            amount: vote.amount_paid.to_string(),
            processing_code: PROCESSING_CODE.to_string(),
            transaction_id: vote.payment.transaction_id.clone(),
            desc: format!(
                "Vote payment for {} - {candidate_name}",
                self.settings.campaign
            ),
            merchant_id: self.settings.merchant_id.clone(),
            subscriber_number: payer.msisdn.clone(),
            r_switch: payer.carrier().switch_code().to_string(),
            callback_url: self.settings.callback_url.clone(),
            reference: format!("{} Vote", self.settings.campaign),
            merchant_data: merchant_data.encode()?,
        })
    }

    pub fn donation_request(
        &self,
        payer: &Payer,
        donation_id: u64,
        transaction_id: &str,
        amount: Amount,
    ) -> Result<PaymentRequest> {
        let merchant_data = MerchantData::Donation {
            session_id: payer.session_id.clone(),
            donation_id,
        };
        Ok(PaymentRequest {
            amount: amount.to_string(),
            processing_code: PROCESSING_CODE.to_string(),
            transaction_id: transaction_id.to_string(),
            desc: format!("Donation for {}", self.settings.campaign),
            merchant_id: self.settings.merchant_id.clone(),
            subscriber_number: payer.msisdn.clone(),
            r_switch: payer.carrier().switch_code().to_string(),
            callback_url: self.settings.callback_url.clone(),
            reference: format!("{} Donation", self.settings.campaign),
            merchant_data: merchant_data.encode()?,
        })
    }

    pub async fn pay_for_vote(
        &self,
        payer: &Payer,
        vote: &VoteRecord,
        candidate_name: &str,
    ) -> Result<()> {
        let request = self.vote_request(payer, vote, candidate_name)?;
        self.send(vote.record_ref(), &request).await
    }

    /// Creates the pending donation and requests its payment. Returns the
    /// donation id.
    pub async fn pay_for_donation(&self, payer: &Payer, amount: Amount) -> Result<u64> {
        let transaction_id = generate_correlation_id(&payer.session_id);
        let donation = self
            .ledger
            .create_donation(NewDonation {
                donor_phone: payer.msisdn.clone(),
                amount,
                transaction_id: transaction_id.clone(),
                session_id: payer.session_id.clone(),
            })
            .await?;
        let request = self.donation_request(payer, donation.id, &transaction_id, amount)?;
        self.send(donation.record_ref(), &request).await?;
        Ok(donation.id)
    }

    async fn send(&self, record: RecordRef, request: &PaymentRequest) -> Result<()> {
        match self.gateway.submit(request).await {
            Ok(()) => {
                info!(
                    %record,
                    transaction_id = %request.transaction_id,
                    "payment request accepted by gateway"
                );
                self.ledger.mark_sent(record, &request.transaction_id).await
            }
            Err(e) => {
                let message = format!("Payment processing failed: {e}");
                self.ledger
                    .settle(record, TransactionStatus::Failed, &message)
                    .await?;
                Err(e)
            }
        }
    }

    /// Fails the pending record of a job that will never be dispatched.
    pub async fn abandon(&self, job: &PaymentJob) -> Result<()> {
        let Some(record) = job.record_ref() else {
            return Ok(());
        };
        let outcome = self
            .ledger
            .settle(record, TransactionStatus::Failed, CANCELLED_MESSAGE)
            .await?;
        if outcome != SettleOutcome::Applied {
            warn!(%record, ?outcome, "abandoned job was not pending");
        }
        Ok(())
    }
}
