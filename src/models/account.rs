//! Account data models and participant request/response types.
//!
//! This module defines:
//! - `Account`: one ledger entry owned by a participant
//! - request bodies for registration and the funds operations
//! - response bodies returned by the participant endpoints

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Balance every freshly registered account opens with, in cents (100.00).
pub const OPENING_BALANCE_CENTS: i64 = 10_000;

/// An account held by exactly one participant.
///
/// # Balance Storage
///
/// Balances are stored as `i64` cents to avoid floating-point precision issues.
/// A balance is never negative after an operation completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_number: String,

    /// Current balance in cents
    pub balance_cents: i64,
}

/// Body of `POST /accounts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAccountRequest {
    pub account_number: String,
}

/// Body shared by check-funds, debit and deposit.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_number": "0000012345",
///   "amount_cents": 5000
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsRequest {
    pub account_number: String,

    /// Amount in cents, must be positive
    pub amount_cents: i64,
}

impl FundsRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_amount(self.amount_cents)
    }
}

/// Reject zero and negative amounts.
pub fn validate_amount(amount_cents: i64) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Reject empty identifiers and any containing whitespace or control
/// characters; identifiers end up in single-line audit records.
pub fn validate_identifier(field: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::InvalidRequest(format!("{} is required", field)));
    }
    if value.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(AppError::InvalidRequest(format!(
            "{} must not contain whitespace or control characters",
            field
        )));
    }
    Ok(())
}

/// Response of `POST /ledger/check-funds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFundsResponse {
    pub approved: bool,
    pub balance_cents: i64,
}

/// Response of `POST /ledger/debit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitResponse {
    pub success: bool,
}

/// Response of `POST /ledger/deposit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositResponse {
    pub success: bool,
    pub new_balance_cents: i64,
}

/// Body of `POST /ledger/abort` and `POST /2pc/abort`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortRequest {
    pub transaction_id: String,
}

impl AbortRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_identifier("transaction_id", &self.transaction_id)
    }
}
