//! Background payment dispatch.
//!
//! The session driver answers the subscriber first and pushes the payment
//! onto a bounded queue. A single worker owns the receiving end, waits the
//! configured delay for each job and runs it on a [`JoinSet`], so slow gateway
//! calls never block the USSD response path. Shutdown cancels the worker:
//! jobs still waiting out their delay are abandoned and their pending records
//! failed, in-flight requests are awaited.

use super::payments::{PaymentClient, PaymentJob};
use crate::error::{Result, UssdError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sending half of the dispatch queue.
#[derive(Clone, Debug)]
pub struct PaymentQueue {
    sender: mpsc::Sender<PaymentJob>,
}

impl PaymentQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PaymentJob>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Never waits: a full or closed queue is an error the caller handles.
    pub fn submit(&self, job: PaymentJob) -> Result<()> {
        self.sender.try_send(job).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "full",
                TrySendError::Closed(_) => "closed",
            };
            UssdError::DispatchError(format!("Payment queue is {reason}"))
        })
    }
}

pub struct PaymentDispatcher {
    queue: PaymentQueue,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl PaymentDispatcher {
    /// Starts the worker on the current runtime.
    pub fn spawn(client: Arc<PaymentClient>, delay: Duration, capacity: usize) -> Self {
        let (queue, receiver) = PaymentQueue::channel(capacity);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(client, receiver, delay, cancel.clone()));
        Self {
            queue,
            cancel,
            worker,
        }
    }

    pub fn queue(&self) -> PaymentQueue {
        self.queue.clone()
    }

    /// Stops accepting work and waits for in-flight requests.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.worker.await {
            error!("payment worker panicked: {e}");
        }
    }
}

async fn run_worker(
    client: Arc<PaymentClient>,
    mut receiver: mpsc::Receiver<PaymentJob>,
    delay: Duration,
    cancel: CancellationToken,
) {
    let mut jobs = JoinSet::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            job = receiver.recv() => {
                let Some(job) = job else { break };
                debug!(session_id = %job.session_id(), "payment job queued");
                jobs.spawn(run_job(client.clone(), job, delay, cancel.clone()));
            }
            Some(done) = jobs.join_next(), if !jobs.is_empty() => {
                if let Err(e) = done {
                    error!("payment job panicked: {e}");
                }
            }
        }
    }

    // Anything still buffered never started its delay.
    receiver.close();
    while let Some(job) = receiver.recv().await {
        if let Err(e) = client.abandon(&job).await {
            warn!("failed to abandon queued payment: {e}");
        }
    }
    while let Some(done) = jobs.join_next().await {
        if let Err(e) = done {
            error!("payment job panicked: {e}");
        }
    }
    info!("payment worker stopped");
}

async fn run_job(
    client: Arc<PaymentClient>,
    job: PaymentJob,
    delay: Duration,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            if let Err(e) = client.abandon(&job).await {
                warn!(session_id = %job.session_id(), "failed to abandon payment: {e}");
            }
            return;
        }
        _ = tokio::time::sleep(delay) => {}
    }

    let session_id = job.session_id().to_string();
    if let Err(e) = client.execute(job).await {
        warn!(%session_id, "payment dispatch failed: {e}");
    }
}
