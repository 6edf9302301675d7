//! Front-door transaction intake.
//!
//! Allocates transaction ids, refuses to track an id twice, and holds the
//! coarse status clients poll for. State lives in memory only.

use std::collections::HashMap;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{validate_amount, validate_identifier},
        transaction::{InitiateRequest, TransactionDetails, TransactionStatus},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intake {
    /// Newly tracked as `Pending`
    Accepted(TransactionDetails),
    /// The id was seen before; nothing changed
    Duplicate(String),
}

#[derive(Default)]
pub struct TransactionIntake {
    transactions: Mutex<HashMap<String, TransactionStatus>>,
}

impl TransactionIntake {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn initiate(&self, request: InitiateRequest) -> Result<Intake, AppError> {
        validate_amount(request.amount_cents)?;

        let transaction_id = request
            .transaction_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        validate_identifier("transaction_id", &transaction_id)?;
        validate_identifier("sender_id", &request.sender_id)?;

        let mut transactions = self.transactions.lock().await;
        if transactions.contains_key(&transaction_id) {
            tracing::warn!(transaction_id = %transaction_id, "Duplicate transaction");
            return Ok(Intake::Duplicate(transaction_id));
        }

        let details = TransactionDetails {
            transaction_id: transaction_id.clone(),
            sender_id: request.sender_id,
            receiver_id: request.receiver_id,
            amount_cents: request.amount_cents,
        };
        transactions.insert(transaction_id.clone(), TransactionStatus::Pending);
        tracing::info!(transaction_id = %transaction_id, "Transaction initiated");
        Ok(Intake::Accepted(details))
    }

    pub async fn status(&self, transaction_id: &str) -> Result<TransactionStatus, AppError> {
        self.transactions
            .lock()
            .await
            .get(transaction_id)
            .copied()
            .ok_or(AppError::TransactionNotFound)
    }

    /// Move a tracked transaction to its final status.
    pub async fn record_outcome(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> Result<(), AppError> {
        if status == TransactionStatus::Pending {
            return Err(AppError::InvalidRequest(
                "Outcome must be Committed or Aborted".to_string(),
            ));
        }

        let mut transactions = self.transactions.lock().await;
        let tracked = transactions
            .get_mut(transaction_id)
            .ok_or(AppError::TransactionNotFound)?;
        *tracked = status;
        tracing::info!(transaction_id, status = %status, "Transaction outcome recorded");
        Ok(())
    }
}
