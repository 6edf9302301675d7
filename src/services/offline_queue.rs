//! Offline-retry queue for debits that failed outside the live protocol.
//!
//! Queued payments bypass the two-phase protocol: each retry selects one
//! participant from the registry and debits it directly.
//!
//! # Retry policy
//!
//! Every `pass_interval` the background loop walks the queue. Each payment
//! gets up to `max_retries` attempts per pass; every attempt rediscovers a
//! participant and bounds the debit by `attempt_timeout`. Between attempts the
//! loop waits `current_backoff`, which starts at `initial_backoff` and doubles
//! after each failure (1s, 2s, 4s, 8s, 16s with the defaults). The wait also
//! follows the last failed attempt of a pass. A payment that
//! succeeds leaves the queue; one that runs out of attempts stays for the next
//! pass.
//!
//! # Locking
//!
//! The queue lock is held only to take the batch and to put survivors back,
//! never across a network call. Payments enqueued during a pass land behind
//! the survivors.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::{
    clients::{ParticipantClient, RegistryClient},
    error::AppError,
    models::transaction::{QueuedPayment, QueuedPaymentView, TransactionDetails},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub attempt_timeout: Duration,
    pub pass_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
            pass_interval: Duration::from_secs(10),
        }
    }
}

/// Outcome counts of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub succeeded: usize,
    pub retained: usize,
}

pub struct OfflineQueue {
    pending: Mutex<Vec<QueuedPayment>>,
    registry: Arc<dyn RegistryClient>,
    participants: Arc<dyn ParticipantClient>,
    policy: RetryPolicy,
}

impl OfflineQueue {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        participants: Arc<dyn ParticipantClient>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            registry,
            participants,
            policy,
        }
    }

    /// Append payments to the queue. Duplicate transaction ids are kept.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: any request is malformed; nothing is queued
    pub async fn enqueue(&self, requests: Vec<TransactionDetails>) -> Result<usize, AppError> {
        for request in &requests {
            request.validate()?;
        }

        let count = requests.len();
        let mut pending = self.pending.lock().await;
        pending.extend(
            requests
                .into_iter()
                .map(|r| QueuedPayment::new(r, self.policy.initial_backoff)),
        );
        tracing::info!(count, queued = pending.len(), "Queued transactions for offline processing");
        Ok(count)
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn pending(&self) -> Vec<QueuedPaymentView> {
        self.pending
            .lock()
            .await
            .iter()
            .map(QueuedPaymentView::from)
            .collect()
    }

    /// Background loop: one pass per interval, forever. A failing pass never
    /// ends the loop.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.policy.pass_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let summary = self.run_pass().await;
            if summary != PassSummary::default() {
                tracing::info!(
                    succeeded = summary.succeeded,
                    retained = summary.retained,
                    "Offline retry pass finished"
                );
            }
        }
    }

    /// Retry every queued payment once through its per-pass budget.
    pub async fn run_pass(&self) -> PassSummary {
        let batch = std::mem::take(&mut *self.pending.lock().await);
        if batch.is_empty() {
            return PassSummary::default();
        }

        let mut summary = PassSummary::default();
        let mut retained = Vec::new();
        for mut payment in batch {
            if self.retry_payment(&mut payment).await {
                summary.succeeded += 1;
            } else {
                tracing::warn!(
                    transaction_id = %payment.request.transaction_id,
                    retries = payment.retry_count,
                    total_attempts = payment.total_attempts,
                    "Payment still failing, kept for next pass"
                );
                retained.push(payment);
            }
        }
        summary.retained = retained.len();

        let mut pending = self.pending.lock().await;
        retained.append(&mut pending);
        *pending = retained;
        summary
    }

    /// Returns `true` once a debit succeeds within the budget.
    async fn retry_payment(&self, payment: &mut QueuedPayment) -> bool {
        payment.retry_count = 0;
        payment.current_backoff = self.policy.initial_backoff;

        while payment.retry_count < self.policy.max_retries {
            payment.total_attempts += 1;

            match self.attempt(&payment.request).await {
                Ok(()) => {
                    tracing::info!(
                        transaction_id = %payment.request.transaction_id,
                        attempt = payment.retry_count + 1,
                        "Queued payment succeeded"
                    );
                    return true;
                }
                Err(e) => {
                    payment.retry_count += 1;
                    payment.last_failure = Some(e.to_string());
                    tracing::warn!(
                        transaction_id = %payment.request.transaction_id,
                        attempt = payment.retry_count,
                        error = %e,
                        backoff = ?payment.current_backoff,
                        "Queued payment attempt failed"
                    );

                    tokio::time::sleep(payment.current_backoff).await;
                    payment.current_backoff *= 2;
                }
            }
        }
        false
    }

    async fn attempt(&self, request: &TransactionDetails) -> Result<(), AppError> {
        let address = self.registry.select().await?;

        let debit = self
            .participants
            .debit(&address, &request.sender_id, request.amount_cents);
        match tokio::time::timeout(self.policy.attempt_timeout, debit).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(AppError::Upstream(format!(
                "debit on {} was unsuccessful",
                address
            ))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AppError::Upstream(format!("debit on {} timed out", address))),
        }
    }
}
