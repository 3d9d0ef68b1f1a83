use super::dispatcher::PaymentQueue;
use super::menu::{Effect, MenuMachine, Transition};
use super::payments::PaymentJob;
use crate::domain::ledger::{NewVote, TransactionStatus};
use crate::domain::payment::generate_correlation_id;
use crate::domain::ports::{LedgerStoreRef, SessionStoreRef};
use crate::domain::session::{Session, VoteOrder};
use crate::domain::ussd::{DialRequest, UssdResponse};
use crate::error::Result;
use chrono::Utc;
use tracing::{error, info, warn};

/// Terminal text shown when anything below the driver fails.
pub const SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable. Please try again later.";

/// The entry point for every USSD hop.
///
/// `SessionDriver` loads (or opens) the session, runs the menu transition,
/// persists the new menu position, applies the transition's effects to the
/// ledger and only then hands payment jobs to the dispatcher queue.
pub struct SessionDriver {
    sessions: SessionStoreRef,
    ledger: LedgerStoreRef,
    machine: MenuMachine,
    payments: PaymentQueue,
}

impl SessionDriver {
    pub fn new(
        sessions: SessionStoreRef,
        ledger: LedgerStoreRef,
        machine: MenuMachine,
        payments: PaymentQueue,
    ) -> Self {
        Self {
            sessions,
            ledger,
            machine,
            payments,
        }
    }

    /// Never fails: errors are logged and turned into a terminal reply.
    pub async fn handle(&self, request: DialRequest) -> UssdResponse {
        match self.exchange(&request).await {
            Ok((response, jobs)) => {
                self.dispatch(jobs).await;
                response
            }
            Err(e) => {
                error!(session_id = %request.session_id, "ussd exchange failed: {e}");
                self.close_after_failure(&request.session_id).await;
                request.respond(SERVICE_UNAVAILABLE, false)
            }
        }
    }

    /// Best effort: the next hop with this id should start from the main menu.
    async fn close_after_failure(&self, session_id: &str) {
        let session = match self.sessions.get(session_id).await {
            Ok(Some(session)) if !session.closed => session,
            Ok(_) => return,
            Err(e) => {
                warn!(%session_id, "could not load session to close it: {e}");
                return;
            }
        };
        let closed = Session {
            closed: true,
            updated_at: Utc::now(),
            ..session
        };
        if let Err(e) = self.sessions.store(closed).await {
            warn!(%session_id, "could not close session after failure: {e}");
        }
    }

    async fn exchange(&self, request: &DialRequest) -> Result<(UssdResponse, Vec<PaymentJob>)> {
        let existing = self
            .sessions
            .get(&request.session_id)
            .await?
            .filter(|session| !session.closed);

        let Some(mut session) = existing else {
            let session = Session::open(
                request.session_id.clone(),
                request.msisdn.clone(),
                request.user_id.clone(),
                request.network.clone(),
            );
            self.sessions.store(session).await?;
            info!(session_id = %request.session_id, "session opened");
            return Ok((request.respond(self.machine.main_menu(), true), Vec::new()));
        };

        let Transition {
            menu,
            prev_menu_state,
            reply,
            effects,
        } = self.machine.advance(&session, &request.user_data).await?;

        session.menu = menu;
        session.prev_menu_state = prev_menu_state;
        session.closed = reply.end;
        session.updated_at = Utc::now();
        info!(
            session_id = %session.session_id,
            state = %session.menu.kind(),
            end = reply.end,
            "menu advanced"
        );
        self.sessions.store(session.clone()).await?;

        // Records are written only after the session has left the confirm step.
        let mut jobs = Vec::with_capacity(effects.len());
        for effect in effects {
            jobs.push(self.apply(&session, effect).await?);
        }

        Ok((request.respond(reply.message, !reply.end), jobs))
    }

    async fn apply(&self, session: &Session, effect: Effect) -> Result<PaymentJob> {
        match effect {
            Effect::RecordVote(order) => self.record_vote(session, order).await,
            Effect::DispatchDonation(amount) => Ok(PaymentJob::Donation {
                payer: session.payer(),
                amount,
            }),
        }
    }

    async fn record_vote(&self, session: &Session, order: VoteOrder) -> Result<PaymentJob> {
        let vote = self
            .ledger
            .create_vote(NewVote {
                candidate_id: order.candidate.id,
                voter_phone: session.msisdn.clone(),
                number_of_votes: order.votes,
                amount_paid: order.amount,
                transaction_id: generate_correlation_id(&session.session_id),
                session_id: session.session_id.clone(),
            })
            .await?;
        info!(
            session_id = %session.session_id,
            record = %vote.record_ref(),
            votes = vote.number_of_votes,
            "vote recorded"
        );
        Ok(PaymentJob::Vote {
            payer: session.payer(),
            vote,
            candidate_name: order.candidate.name,
        })
    }

    /// A job that cannot be queued fails its pending record straight away.
    async fn dispatch(&self, jobs: Vec<PaymentJob>) {
        for job in jobs {
            let record = job.record_ref();
            if let Err(e) = self.payments.submit(job) {
                warn!("payment job not queued: {e}");
                if let Some(record) = record {
                    let message = format!("Payment processing failed: {e}");
                    if let Err(e) = self
                        .ledger
                        .settle(record, TransactionStatus::Failed, &message)
                        .await
                    {
                        error!(%record, "could not fail unqueued payment: {e}");
                    }
                }
            }
        }
    }
}
