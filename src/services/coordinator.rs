//! Two-phase-commit coordinator.
//!
//! Drives every live participant through a prepare round and then a commit
//! or abort round. The coordinator keeps no transaction table: the caller
//! holds the transaction id across the three calls, and the audit-log sink
//! is the only durable record of the outcome.
//!
//! # Protocol
//!
//! 1. **Prepare** (`ready_to_commit`): ask every participant, in registry
//!    order, whether the sender can cover the amount. The first "no", error or
//!    the overall deadline ends the round with a rejected vote.
//! 2. **Commit**: debit the sender on every participant, in registry order.
//!    The first failure stops the round. Participants debited before it keep
//!    their new balance.
//! 3. **Abort**: tell every participant, best effort.
//!
//! # Known gaps
//!
//! - Participants hold no funds between prepare and commit, so a balance may
//!   change in between and the commit round can still fail.
//! - A mid-commit failure is surfaced as `CommitFailed` without compensation.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    clients::{AuditSink, ParticipantClient, RegistryClient},
    error::AppError,
    models::{
        account::validate_identifier,
        transaction::{AuditRecord, TransactionDetails, TransactionPhase, TransactionStatus},
    },
};

/// Overall deadline of one prepare round.
pub const PREPARE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Coordinator {
    registry: Arc<dyn RegistryClient>,
    participants: Arc<dyn ParticipantClient>,
    audit: Arc<dyn AuditSink>,
}

impl Coordinator {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        participants: Arc<dyn ParticipantClient>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            participants,
            audit,
        }
    }

    /// Run the prepare round and return the final decision.
    ///
    /// A rejected vote is `Ok(false)`; callers never learn which participant
    /// declined.
    ///
    /// # Errors
    ///
    /// - `NoParticipantsAvailable`: the registry listed nobody
    /// - `InvalidRequest`: malformed transaction
    pub async fn ready_to_commit(&self, details: &TransactionDetails) -> Result<bool, AppError> {
        details.validate()?;
        log_phase(details, TransactionPhase::Initiated);

        let participants = self.live_participants().await?;
        log_phase(details, TransactionPhase::Preparing);

        match tokio::time::timeout(PREPARE_TIMEOUT, self.collect_votes(details, &participants))
            .await
        {
            Ok(Ok(())) => {
                tracing::info!(
                    transaction_id = %details.transaction_id,
                    participants = participants.len(),
                    "All participants ready to commit"
                );
                Ok(true)
            }
            Ok(Err(AppError::VoteRejected)) => Ok(false),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    transaction_id = %details.transaction_id,
                    timeout = ?PREPARE_TIMEOUT,
                    "Prepare round timed out, treating outstanding votes as no"
                );
                Ok(false)
            }
        }
    }

    /// Ask each participant in turn; stop at the first non-affirmative answer.
    async fn collect_votes(
        &self,
        details: &TransactionDetails,
        participants: &[String],
    ) -> Result<(), AppError> {
        for address in participants {
            let vote = self
                .participants
                .check_funds(address, &details.sender_id, details.amount_cents)
                .await;

            match vote {
                Ok(response) if response.approved => {
                    tracing::debug!(
                        transaction_id = %details.transaction_id,
                        participant = %address,
                        "Participant voted yes"
                    );
                }
                Ok(_) => {
                    tracing::info!(
                        transaction_id = %details.transaction_id,
                        participant = %address,
                        "Participant not ready to commit"
                    );
                    return Err(AppError::VoteRejected);
                }
                Err(e) => {
                    tracing::warn!(
                        transaction_id = %details.transaction_id,
                        participant = %address,
                        error = %e,
                        "Participant vote failed"
                    );
                    return Err(AppError::VoteRejected);
                }
            }
        }
        Ok(())
    }

    /// Debit the sender on every participant and record the outcome.
    ///
    /// # Errors
    ///
    /// - `NoParticipantsAvailable`: the registry listed nobody
    /// - `CommitFailed`: a participant debit failed; earlier debits stand
    pub async fn commit(&self, details: &TransactionDetails) -> Result<(), AppError> {
        details.validate()?;
        let participants = self.live_participants().await?;

        for address in &participants {
            let debited = self
                .participants
                .debit(address, &details.sender_id, details.amount_cents)
                .await;

            match debited {
                Ok(true) => {
                    tracing::debug!(
                        transaction_id = %details.transaction_id,
                        participant = %address,
                        "Participant committed"
                    );
                }
                Ok(false) => {
                    tracing::error!(
                        transaction_id = %details.transaction_id,
                        participant = %address,
                        "Participant refused commit"
                    );
                    return Err(AppError::CommitFailed);
                }
                Err(e) => {
                    tracing::error!(
                        transaction_id = %details.transaction_id,
                        participant = %address,
                        error = %e,
                        "Participant commit failed"
                    );
                    return Err(AppError::CommitFailed);
                }
            }
        }

        log_phase(details, TransactionPhase::Committed);
        self.emit(AuditRecord::system(
            &details.transaction_id,
            details.amount_cents,
            TransactionStatus::Committed,
        ))
        .await;
        Ok(())
    }

    /// Broadcast the abort to every participant and record it.
    ///
    /// Individual notification failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// - `NoParticipantsAvailable`: the registry listed nobody
    /// - `InvalidRequest`: malformed transaction id
    pub async fn abort(&self, transaction_id: &str) -> Result<(), AppError> {
        validate_identifier("transaction_id", transaction_id)?;
        let participants = self.live_participants().await?;

        for address in &participants {
            if let Err(e) = self
                .participants
                .acknowledge_abort(address, transaction_id)
                .await
            {
                tracing::warn!(
                    transaction_id,
                    participant = %address,
                    error = %e,
                    "Failed to notify participant about abort"
                );
            }
        }

        tracing::info!(transaction_id, phase = %TransactionPhase::Aborted, "Transaction aborted");
        self.emit(AuditRecord::system(
            transaction_id,
            0,
            TransactionStatus::Aborted,
        ))
        .await;
        Ok(())
    }

    async fn live_participants(&self) -> Result<Vec<String>, AppError> {
        let participants = match self.registry.list().await {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(error = %e, "Participant discovery failed");
                return Err(AppError::NoParticipantsAvailable);
            }
        };

        if participants.is_empty() {
            tracing::warn!("No participants registered");
            return Err(AppError::NoParticipantsAvailable);
        }
        Ok(participants)
    }

    /// Hand a record to the audit sink; failures never change the outcome.
    async fn emit(&self, record: AuditRecord) {
        if let Err(e) = self.audit.record(record).await {
            tracing::warn!(error = %e, "Failed to record transaction outcome");
        }
    }
}

fn log_phase(details: &TransactionDetails, phase: TransactionPhase) {
    tracing::info!(
        transaction_id = %details.transaction_id,
        sender_id = %details.sender_id,
        amount_cents = details.amount_cents,
        phase = %phase,
        "Transaction phase"
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::models::account::CheckFundsResponse;
    use crate::services::ledger::Ledger;
    use crate::services::registry::{Registry, RegistryPolicy};

    /// Participants backed by real in-memory ledgers, keyed by address.
    /// Counts every call and can be told to fail specific addresses.
    #[derive(Default)]
    pub(crate) struct LedgerParticipants {
        ledgers: HashMap<String, Arc<Ledger>>,
        unreachable: StdMutex<Vec<String>>,
        pub checks: AtomicUsize,
        pub debits: AtomicUsize,
        pub aborts: AtomicUsize,
        pub stall_checks: bool,
    }

    impl LedgerParticipants {
        pub(crate) fn with(ledgers: Vec<(&str, Arc<Ledger>)>) -> Self {
            Self {
                ledgers: ledgers
                    .into_iter()
                    .map(|(a, l)| (a.to_string(), l))
                    .collect(),
                ..Default::default()
            }
        }

        pub(crate) fn set_unreachable(&self, address: &str) {
            self.unreachable.lock().unwrap().push(address.to_string());
        }

        fn ledger(&self, address: &str) -> Result<&Arc<Ledger>, AppError> {
            if self.unreachable.lock().unwrap().iter().any(|a| a == address) {
                return Err(AppError::Upstream(format!("{} unreachable", address)));
            }
            self.ledgers
                .get(address)
                .ok_or_else(|| AppError::Upstream(format!("{} unknown", address)))
        }
    }

    #[async_trait]
    impl ParticipantClient for LedgerParticipants {
        async fn check_funds(
            &self,
            address: &str,
            account_number: &str,
            amount_cents: i64,
        ) -> Result<CheckFundsResponse, AppError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if self.stall_checks {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            let (approved, balance_cents) = self
                .ledger(address)?
                .check_sufficient_funds(account_number, amount_cents)
                .await?;
            Ok(CheckFundsResponse {
                approved,
                balance_cents,
            })
        }

        async fn debit(
            &self,
            address: &str,
            account_number: &str,
            amount_cents: i64,
        ) -> Result<bool, AppError> {
            self.debits.fetch_add(1, Ordering::SeqCst);
            self.ledger(address)?.debit(account_number, amount_cents).await?;
            Ok(true)
        }

        async fn acknowledge_abort(
            &self,
            address: &str,
            transaction_id: &str,
        ) -> Result<(), AppError> {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            self.ledger(address)?.acknowledge_abort(transaction_id);
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingAudit {
        pub records: StdMutex<Vec<AuditRecord>>,
    }

    #[async_trait]
    impl AuditSink for RecordingAudit {
        async fn record(&self, record: AuditRecord) -> Result<(), AppError> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
    }

    const P1: &str = "http://127.0.0.1:4001";
    const P2: &str = "http://127.0.0.1:4002";
    const P3: &str = "http://127.0.0.1:4003";

    fn details(amount_cents: i64) -> TransactionDetails {
        TransactionDetails {
            transaction_id: "tx-1".to_string(),
            sender_id: "alice".to_string(),
            receiver_id: "bob".to_string(),
            amount_cents,
        }
    }

    /// Three participants where alice has `balances[i]` cents on participant i.
    async fn fixture(
        balances: [i64; 3],
    ) -> (Arc<Registry>, Vec<Arc<Ledger>>, LedgerParticipants) {
        let registry = Arc::new(Registry::new(RegistryPolicy::participants()));
        let mut ledgers = Vec::new();
        for (address, balance) in [P1, P2, P3].into_iter().zip(balances) {
            registry.register(address).await.unwrap();
            let ledger = Arc::new(Ledger::new());
            ledger.register_account("alice").await.unwrap();
            // opening balance is 10_000; trim down to the wanted balance
            if balance < 10_000 {
                ledger.debit("alice", 10_000 - balance).await.unwrap();
            }
            ledgers.push(ledger);
        }
        let participants = LedgerParticipants::with(vec![
            (P1, ledgers[0].clone()),
            (P2, ledgers[1].clone()),
            (P3, ledgers[2].clone()),
        ]);
        (registry, ledgers, participants)
    }

    fn coordinator(
        registry: Arc<Registry>,
        participants: Arc<LedgerParticipants>,
        audit: Arc<RecordingAudit>,
    ) -> Coordinator {
        Coordinator::new(registry, participants, audit)
    }

    #[tokio::test]
    async fn test_one_rejecting_participant_blocks_commit() {
        // P2 cannot cover 5_000
        let (registry, _, participants) = fixture([10_000, 3_000, 10_000]).await;
        let participants = Arc::new(participants);
        let audit = Arc::new(RecordingAudit::default());
        let coordinator = coordinator(registry, participants.clone(), audit.clone());

        assert!(!coordinator.ready_to_commit(&details(5_000)).await.unwrap());
        // short-circuit: P3 never polled
        assert_eq!(participants.checks.load(Ordering::SeqCst), 2);
        assert_eq!(participants.debits.load(Ordering::SeqCst), 0);

        // unchanged ledgers give the same decision
        assert!(!coordinator.ready_to_commit(&details(5_000)).await.unwrap());
        assert_eq!(participants.debits.load(Ordering::SeqCst), 0);
        assert!(audit.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_participant_votes_no() {
        let (registry, _, participants) = fixture([10_000, 10_000, 10_000]).await;
        participants.set_unreachable(P1);
        let coordinator = coordinator(
            registry,
            Arc::new(participants),
            Arc::new(RecordingAudit::default()),
        );

        assert!(!coordinator.ready_to_commit(&details(100)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unanimous_vote_is_true() {
        let (registry, _, participants) = fixture([10_000, 10_000, 10_000]).await;
        let participants = Arc::new(participants);
        let coordinator = coordinator(
            registry,
            participants.clone(),
            Arc::new(RecordingAudit::default()),
        );

        assert!(coordinator.ready_to_commit(&details(5_000)).await.unwrap());
        assert_eq!(participants.checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_registry_has_no_participants() {
        let registry = Arc::new(Registry::new(RegistryPolicy::participants()));
        let coordinator = coordinator(
            registry,
            Arc::new(LedgerParticipants::default()),
            Arc::new(RecordingAudit::default()),
        );

        assert!(matches!(
            coordinator.ready_to_commit(&details(1)).await,
            Err(AppError::NoParticipantsAvailable)
        ));
        assert!(matches!(
            coordinator.commit(&details(1)).await,
            Err(AppError::NoParticipantsAvailable)
        ));
        assert!(matches!(
            coordinator.abort("tx-1").await,
            Err(AppError::NoParticipantsAvailable)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_deadline_rejects_vote() {
        let (registry, _, mut participants) = fixture([10_000, 10_000, 10_000]).await;
        participants.stall_checks = true;
        let coordinator = coordinator(
            registry,
            Arc::new(participants),
            Arc::new(RecordingAudit::default()),
        );

        let started = tokio::time::Instant::now();
        assert!(!coordinator.ready_to_commit(&details(1)).await.unwrap());
        assert_eq!(started.elapsed(), PREPARE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_commit_stops_at_first_failure_without_rollback() {
        // prepare would have passed, then P2's balance drops before commit
        let (registry, ledgers, participants) = fixture([10_000, 10_000, 10_000]).await;
        let participants = Arc::new(participants);
        let audit = Arc::new(RecordingAudit::default());
        let coordinator = coordinator(registry, participants.clone(), audit.clone());

        assert!(coordinator.ready_to_commit(&details(5_000)).await.unwrap());
        ledgers[1].debit("alice", 6_000).await.unwrap();

        assert!(matches!(
            coordinator.commit(&details(5_000)).await,
            Err(AppError::CommitFailed)
        ));
        // P1 already debited and stays debited, P3 never reached
        assert_eq!(ledgers[0].account("alice").await.unwrap().balance_cents, 5_000);
        assert_eq!(ledgers[2].account("alice").await.unwrap().balance_cents, 10_000);
        assert_eq!(participants.debits.load(Ordering::SeqCst), 2);
        assert!(audit.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abort_is_best_effort_broadcast() {
        let (registry, _, participants) = fixture([10_000, 10_000, 10_000]).await;
        participants.set_unreachable(P2);
        let participants = Arc::new(participants);
        let audit = Arc::new(RecordingAudit::default());
        let coordinator = coordinator(registry, participants.clone(), audit.clone());

        coordinator.abort("tx-7").await.unwrap();

        assert_eq!(participants.aborts.load(Ordering::SeqCst), 3);
        let records = audit.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transaction_id, "tx-7");
        assert_eq!(records[0].status, TransactionStatus::Aborted);
    }

    #[tokio::test]
    async fn test_end_to_end_commit_records_once() {
        let registry = Arc::new(Registry::new(RegistryPolicy::participants()));
        registry.register(P1).await.unwrap();
        let ledger = Arc::new(Ledger::new());
        ledger.register_account("P").await.unwrap();
        let participants = Arc::new(LedgerParticipants::with(vec![(P1, ledger.clone())]));
        let audit = Arc::new(RecordingAudit::default());
        let coordinator = coordinator(registry, participants, audit.clone());

        let transfer = TransactionDetails {
            transaction_id: "tx-e2e".to_string(),
            sender_id: "P".to_string(),
            receiver_id: "Q".to_string(),
            amount_cents: 5_000,
        };

        assert!(coordinator.ready_to_commit(&transfer).await.unwrap());
        coordinator.commit(&transfer).await.unwrap();

        assert_eq!(ledger.account("P").await.unwrap().balance_cents, 5_000);
        let records = audit.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TransactionStatus::Committed);
        assert_eq!(records[0].amount_cents, 5_000);
        assert_eq!(records[0].party, "SYSTEM");
    }

    #[tokio::test]
    async fn test_invalid_amount_is_rejected_before_discovery() {
        let registry = Arc::new(Registry::new(RegistryPolicy::participants()));
        let coordinator = coordinator(
            registry,
            Arc::new(LedgerParticipants::default()),
            Arc::new(RecordingAudit::default()),
        );

        assert!(matches!(
            coordinator.ready_to_commit(&details(-5)).await,
            Err(AppError::InvalidRequest(_))
        ));
    }
}
