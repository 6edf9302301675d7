//! Account-ledger participant HTTP handlers.
//!
//! - POST /accounts - Register an account with the opening balance
//! - GET /accounts/{account_number} - Current balance
//! - POST /ledger/check-funds - Prepare vote for one account
//! - POST /ledger/debit - Authoritative debit
//! - POST /ledger/deposit - Deposit
//! - POST /ledger/abort - Acknowledge an abort

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    error::AppError,
    models::{
        account::{
            AbortRequest, Account, CheckFundsResponse, DebitResponse, DepositResponse,
            FundsRequest, RegisterAccountRequest,
        },
        registry::StatusResponse,
    },
    services::ledger::Ledger,
};

/// Register an account.
///
/// Re-registering an existing account is a successful no-op.
pub async fn register_account(
    State(ledger): State<Arc<Ledger>>,
    Json(request): Json<RegisterAccountRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let created = ledger.register_account(&request.account_number).await?;
    let status = if created {
        "Account created"
    } else {
        "Account already registered"
    };
    Ok(Json(StatusResponse::new(status)))
}

pub async fn get_account(
    State(ledger): State<Arc<Ledger>>,
    Path(account_number): Path<String>,
) -> Result<Json<Account>, AppError> {
    Ok(Json(ledger.account(&account_number).await?))
}

/// Vote on whether the account can cover the amount.
///
/// # Request Body
///
/// ```json
/// { "account_number": "0000012345", "amount_cents": 5000 }
/// ```
///
/// # Response (200)
///
/// ```json
/// { "approved": true, "balance_cents": 10000 }
/// ```
///
/// `approved` requires the balance to strictly exceed the amount.
pub async fn check_funds(
    State(ledger): State<Arc<Ledger>>,
    Json(request): Json<FundsRequest>,
) -> Result<Json<CheckFundsResponse>, AppError> {
    request.validate()?;
    let (approved, balance_cents) = ledger
        .check_sufficient_funds(&request.account_number, request.amount_cents)
        .await?;
    Ok(Json(CheckFundsResponse {
        approved,
        balance_cents,
    }))
}

/// Debit the account.
///
/// # Errors
///
/// - 404 `account_not_found`
/// - 422 `insufficient_funds` (includes an amount equal to the balance)
pub async fn debit(
    State(ledger): State<Arc<Ledger>>,
    Json(request): Json<FundsRequest>,
) -> Result<Json<DebitResponse>, AppError> {
    request.validate()?;
    ledger
        .debit(&request.account_number, request.amount_cents)
        .await?;
    Ok(Json(DebitResponse { success: true }))
}

pub async fn deposit(
    State(ledger): State<Arc<Ledger>>,
    Json(request): Json<FundsRequest>,
) -> Result<Json<DepositResponse>, AppError> {
    request.validate()?;
    let new_balance_cents = ledger
        .deposit(&request.account_number, request.amount_cents)
        .await?;
    Ok(Json(DepositResponse {
        success: true,
        new_balance_cents,
    }))
}

pub async fn acknowledge_abort(
    State(ledger): State<Arc<Ledger>>,
    Json(request): Json<AbortRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    request.validate()?;
    ledger.acknowledge_abort(&request.transaction_id);
    Ok(Json(StatusResponse::new("Aborted")))
}

pub fn router(ledger: Arc<Ledger>) -> Router {
    Router::new()
        .route("/accounts", post(register_account))
        .route("/accounts/{account_number}", get(get_account))
        .route("/ledger/check-funds", post(check_funds))
        .route("/ledger/debit", post(debit))
        .route("/ledger/deposit", post(deposit))
        .route("/ledger/abort", post(acknowledge_abort))
        .with_state(ledger)
}
