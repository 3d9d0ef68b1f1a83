#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use ussd_vote::application::dispatcher::PaymentQueue;
use ussd_vote::application::driver::SessionDriver;
use ussd_vote::application::menu::{MenuConfig, MenuMachine};
use ussd_vote::application::payments::{PaymentClient, PaymentJob, PaymentSettings};
use ussd_vote::application::reconciler::{CallbackReconciler, ReconcilerSettings};
use ussd_vote::domain::candidate::Candidate;
use ussd_vote::domain::payment::PaymentRequest;
use ussd_vote::domain::ports::{Notifier, PaymentGateway};
use ussd_vote::domain::ussd::{DialRequest, UssdResponse};
use ussd_vote::error::{Result, UssdError};
use ussd_vote::infrastructure::in_memory::{
    InMemoryCandidateDirectory, InMemoryLedgerStore, InMemorySessionStore,
};

pub const CAMPAIGN: &str = "Borbor Carnival 25";
pub const ADMIN: &str = "233200000000";

/// Gateway double that records every request and answers with a fixed outcome.
#[derive(Clone, Default)]
pub struct RecordingGateway {
    pub requests: Arc<Mutex<Vec<PaymentRequest>>>,
    pub reject_with: Option<u16>,
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn submit(&self, request: &PaymentRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        match self.reject_with {
            Some(status) => Err(UssdError::GatewayRejected {
                status,
                body: "rejected".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, msisdn: &str, message: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((msisdn.to_string(), message.to_string()));
        Ok(())
    }
}

pub fn seeded_directory() -> InMemoryCandidateDirectory {
    let mut retired = Candidate::new(3, "Retired Troupe", "099");
    retired.is_active = false;
    [
        Candidate::new(1, "Elikem Group", "013"),
        Candidate::new(2, "Agbadza Stars", "021"),
        retired,
    ]
    .into_iter()
    .collect()
}

pub fn payment_settings() -> PaymentSettings {
    PaymentSettings {
        merchant_id: "TTM-0001".to_string(),
        callback_url: "http://localhost/api/payment/callback".to_string(),
        campaign: CAMPAIGN.to_string(),
    }
}

pub fn reconciler_settings() -> ReconcilerSettings {
    ReconcilerSettings {
        approved_status: "approved".to_string(),
        admin_phone: Some(ADMIN.to_string()),
        campaign: CAMPAIGN.to_string(),
    }
}

/// Everything wired over in-memory stores, with the payment queue's receiving
/// end exposed so tests decide when jobs run.
pub struct TestApp {
    pub driver: SessionDriver,
    pub reconciler: CallbackReconciler,
    pub payments: PaymentClient,
    pub sessions: InMemorySessionStore,
    pub ledger: InMemoryLedgerStore,
    pub gateway: RecordingGateway,
    pub notifier: RecordingNotifier,
    pub jobs: tokio::sync::mpsc::Receiver<PaymentJob>,
}

impl TestApp {
    pub fn new(menu: MenuConfig) -> Self {
        Self::with_gateway(menu, RecordingGateway::default())
    }

    pub fn with_gateway(menu: MenuConfig, gateway: RecordingGateway) -> Self {
        let sessions = InMemorySessionStore::new();
        let ledger = InMemoryLedgerStore::new();
        let notifier = RecordingNotifier::default();
        let (queue, jobs) = PaymentQueue::channel(64);

        let driver = SessionDriver::new(
            Arc::new(sessions.clone()),
            Arc::new(ledger.clone()),
            MenuMachine::new(menu, Arc::new(seeded_directory())),
            queue,
        );
        let reconciler = CallbackReconciler::new(
            Arc::new(ledger.clone()),
            Box::new(notifier.clone()),
            reconciler_settings(),
        );
        let payments = PaymentClient::new(
            Box::new(gateway.clone()),
            Arc::new(ledger.clone()),
            payment_settings(),
        );

        Self {
            driver,
            reconciler,
            payments,
            sessions,
            ledger,
            gateway,
            notifier,
            jobs,
        }
    }

    pub async fn dial(&self, session: &str, input: &str) -> UssdResponse {
        let request = DialRequest::new(session, "233241234567", input).with_network("MTN");
        self.driver.handle(request).await
    }

    /// Runs every queued payment job to completion.
    pub async fn run_jobs(&mut self) {
        while let Ok(job) = self.jobs.try_recv() {
            let _ = self.payments.execute(job).await;
        }
    }
}
