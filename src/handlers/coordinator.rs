//! Two-phase-commit coordinator HTTP handlers.
//!
//! - POST /2pc/prepare - Prepare round, returns the final decision
//! - POST /2pc/commit - Commit round
//! - POST /2pc/abort - Abort broadcast
//!
//! All routes require a bearer token.

use std::sync::Arc;

use axum::{
    Extension, Json, Router, extract::State, middleware as axum_middleware, routing::post,
};

use crate::{
    error::AppError,
    middleware::auth::{AuthContext, TokenSigner, auth_middleware},
    models::{
        account::AbortRequest,
        registry::StatusResponse,
        transaction::{TransactionDetails, VoteResponse},
    },
    services::coordinator::Coordinator,
};

/// Ask every participant whether the transaction can commit.
///
/// # Request Body
///
/// ```json
/// {
///   "transaction_id": "6f1c7f0e-...",
///   "sender_id": "0000012345",
///   "receiver_id": "0000067890",
///   "amount_cents": 5000
/// }
/// ```
///
/// # Response (200)
///
/// ```json
/// { "final_decision": true }
/// ```
///
/// Any failure other than a malformed request, including an empty
/// participant pool, is reported as `final_decision: false`.
pub async fn prepare(
    State(coordinator): State<Arc<Coordinator>>,
    Extension(auth): Extension<AuthContext>,
    Json(details): Json<TransactionDetails>,
) -> Result<Json<VoteResponse>, AppError> {
    tracing::debug!(caller = %auth.caller, transaction_id = %details.transaction_id, "Prepare requested");

    let final_decision = match coordinator.ready_to_commit(&details).await {
        Ok(decision) => decision,
        Err(e @ AppError::InvalidRequest(_)) => return Err(e),
        Err(e) => {
            tracing::warn!(
                transaction_id = %details.transaction_id,
                error = %e,
                "Prepare failed, voting no"
            );
            false
        }
    };

    Ok(Json(VoteResponse { final_decision }))
}

/// Debit the sender on every participant.
///
/// # Errors
///
/// - 409 `commit_failed` when any participant debit fails
/// - 503 `no_participants_available`
pub async fn commit(
    State(coordinator): State<Arc<Coordinator>>,
    Extension(auth): Extension<AuthContext>,
    Json(details): Json<TransactionDetails>,
) -> Result<Json<StatusResponse>, AppError> {
    tracing::debug!(caller = %auth.caller, transaction_id = %details.transaction_id, "Commit requested");
    coordinator.commit(&details).await?;
    Ok(Json(StatusResponse::new("Commit successful")))
}

pub async fn abort(
    State(coordinator): State<Arc<Coordinator>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<AbortRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    tracing::debug!(caller = %auth.caller, transaction_id = %request.transaction_id, "Abort requested");
    coordinator.abort(&request.transaction_id).await?;
    Ok(Json(StatusResponse::new("Aborted")))
}

pub fn router(coordinator: Arc<Coordinator>, signer: Arc<TokenSigner>) -> Router {
    Router::new()
        .route("/2pc/prepare", post(prepare))
        .route("/2pc/commit", post(commit))
        .route("/2pc/abort", post(abort))
        .route_layer(axum_middleware::from_fn_with_state(signer, auth_middleware))
        .with_state(coordinator)
}
