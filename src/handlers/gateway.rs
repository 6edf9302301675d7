//! Front-door transaction intake HTTP handlers.
//!
//! - POST /api/v1/transactions - Initiate a transaction
//! - GET /api/v1/transactions/{id} - Coarse status
//! - PUT /api/v1/transactions/{id}/status - Record the final outcome
//!
//! All routes require a bearer token.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::{
    error::AppError,
    middleware::auth::{AuthContext, TokenSigner, auth_middleware},
    models::transaction::{
        InitiateRequest, OutcomeRequest, TransactionStatus, TransactionStatusResponse,
    },
    services::intake::{Intake, TransactionIntake},
};

/// Status reported for an id that is already tracked.
pub const DUPLICATE_STATUS: &str = "Duplicate";

/// Initiate a transaction.
///
/// # Request Body
///
/// ```json
/// {
///   "transaction_id": "optional, allocated when absent",
///   "sender_id": "0000012345",
///   "receiver_id": "0000067890",
///   "amount_cents": 5000
/// }
/// ```
///
/// # Response
///
/// 201 with status `Pending` for a new id, 200 with status `Duplicate` for
/// an id seen before.
pub async fn initiate(
    State(intake): State<Arc<TransactionIntake>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<InitiateRequest>,
) -> Result<(StatusCode, Json<TransactionStatusResponse>), AppError> {
    tracing::debug!(caller = %auth.caller, "Transaction submitted");

    let response = match intake.initiate(request).await? {
        Intake::Accepted(details) => (
            StatusCode::CREATED,
            Json(TransactionStatusResponse {
                transaction_id: details.transaction_id,
                status: TransactionStatus::Pending.to_string(),
            }),
        ),
        Intake::Duplicate(transaction_id) => (
            StatusCode::OK,
            Json(TransactionStatusResponse {
                transaction_id,
                status: DUPLICATE_STATUS.to_string(),
            }),
        ),
    };
    Ok(response)
}

pub async fn status(
    State(intake): State<Arc<TransactionIntake>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransactionStatusResponse>, AppError> {
    let status = intake.status(&transaction_id).await?;
    Ok(Json(TransactionStatusResponse {
        transaction_id,
        status: status.to_string(),
    }))
}

pub async fn record_outcome(
    State(intake): State<Arc<TransactionIntake>>,
    Extension(auth): Extension<AuthContext>,
    Path(transaction_id): Path<String>,
    Json(request): Json<OutcomeRequest>,
) -> Result<Json<TransactionStatusResponse>, AppError> {
    tracing::debug!(caller = %auth.caller, transaction_id = %transaction_id, "Outcome reported");
    intake.record_outcome(&transaction_id, request.status).await?;
    Ok(Json(TransactionStatusResponse {
        transaction_id,
        status: request.status.to_string(),
    }))
}

pub fn router(intake: Arc<TransactionIntake>, signer: Arc<TokenSigner>) -> Router {
    Router::new()
        .route("/api/v1/transactions", post(initiate))
        .route("/api/v1/transactions/{id}", get(status))
        .route("/api/v1/transactions/{id}/status", put(record_outcome))
        .route_layer(axum_middleware::from_fn_with_state(signer, auth_middleware))
        .with_state(intake)
}
