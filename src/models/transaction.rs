//! Transaction data models and API request/response types.
//!
//! This module defines:
//! - `TransactionDetails`: the sender/receiver/amount triple a round acts on
//! - `TransactionPhase` and `TransactionStatus`: protocol phase and coarse outcome
//! - `QueuedPayment`: an offline-queue entry with its retry state
//! - `AuditRecord`: the outcome line handed to the audit-log sink
//! - gateway intake bodies

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::account::{validate_amount, validate_identifier};

/// One funds transfer, alive only for a single prepare/commit-or-abort round.
///
/// # JSON Example
///
/// ```json
/// {
///   "transaction_id": "6f1c7f0e-2f39-4c57-9d0c-1c1f3b1b2f11",
///   "sender_id": "0000012345",
///   "receiver_id": "0000067890",
///   "amount_cents": 5000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    /// Globally unique, assigned by the caller or the gateway
    pub transaction_id: String,

    pub sender_id: String,

    pub receiver_id: String,

    /// Amount in cents, must be positive
    pub amount_cents: i64,
}

impl TransactionDetails {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_identifier("transaction_id", &self.transaction_id)?;
        validate_identifier("sender_id", &self.sender_id)?;
        validate_amount(self.amount_cents)
    }
}

/// Protocol phase of one transaction inside the coordinator.
///
/// `Initiated -> Preparing -> {Committed | Aborted}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    Initiated,
    Preparing,
    Committed,
    Aborted,
}

impl fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiated => write!(f, "initiated"),
            Self::Preparing => write!(f, "preparing"),
            Self::Committed => write!(f, "committed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Coarse status clients poll for and the audit log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Committed,
    Aborted,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Committed => write!(f, "Committed"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Response of `POST /2pc/prepare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub final_decision: bool,
}

/// Body of `POST /offline-queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub transactions: Vec<TransactionDetails>,
}

/// A transaction waiting in the offline-retry queue.
#[derive(Debug, Clone)]
pub struct QueuedPayment {
    pub request: TransactionDetails,

    /// Attempts made in the current pass
    pub retry_count: u32,

    /// Delay to wait after the next failed attempt
    pub current_backoff: Duration,

    /// Attempts made across every pass since enqueue
    pub total_attempts: u64,

    pub last_failure: Option<String>,
}

impl QueuedPayment {
    pub fn new(request: TransactionDetails, initial_backoff: Duration) -> Self {
        Self {
            request,
            retry_count: 0,
            current_backoff: initial_backoff,
            total_attempts: 0,
            last_failure: None,
        }
    }
}

/// Operator view of one queued payment (`GET /offline-queue`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedPaymentView {
    pub transaction_id: String,
    pub sender_id: String,
    pub amount_cents: i64,
    pub total_attempts: u64,
    pub last_failure: Option<String>,
}

impl From<&QueuedPayment> for QueuedPaymentView {
    fn from(payment: &QueuedPayment) -> Self {
        Self {
            transaction_id: payment.request.transaction_id.clone(),
            sender_id: payment.request.sender_id.clone(),
            amount_cents: payment.request.amount_cents,
            total_attempts: payment.total_attempts,
            last_failure: payment.last_failure.clone(),
        }
    }
}

/// Transaction outcome appended to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub transaction_id: String,

    /// Who the record is attributed to (`SYSTEM` for coordinator outcomes)
    pub party: String,

    pub amount_cents: i64,

    pub status: TransactionStatus,

    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn system(transaction_id: &str, amount_cents: i64, status: TransactionStatus) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            party: "SYSTEM".to_string(),
            amount_cents,
            status,
            timestamp: Utc::now(),
        }
    }

    /// Fields written verbatim into the log line must keep it a single record.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_identifier("transaction_id", &self.transaction_id)?;
        validate_identifier("party", &self.party)
    }

    /// One line of the append-only log, without the trailing newline.
    pub fn to_log_line(&self) -> String {
        format!(
            "[{}] transaction={} party={} amount_cents={} status={}",
            self.timestamp.to_rfc3339(),
            self.transaction_id,
            self.party,
            self.amount_cents,
            self.status
        )
    }
}

/// Body of `POST /api/v1/transactions`.
///
/// `transaction_id` may be omitted; the gateway then allocates one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateRequest {
    pub transaction_id: Option<String>,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount_cents: i64,
}

/// Response of the gateway endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatusResponse {
    pub transaction_id: String,
    pub status: String,
}

/// Body of `PUT /api/v1/transactions/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRequest {
    pub status: TransactionStatus,
}
