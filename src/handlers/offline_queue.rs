//! Offline-retry queue HTTP handlers.
//!
//! - POST /offline-queue - Queue transactions for background retry
//! - GET /offline-queue - Pending payments, for operator attention

use std::sync::Arc;

use axum::{
    Extension, Json, Router, extract::State, middleware as axum_middleware, routing::post,
};

use crate::{
    error::AppError,
    middleware::auth::{AuthContext, TokenSigner, auth_middleware},
    models::{
        registry::StatusResponse,
        transaction::{EnqueueRequest, QueuedPaymentView},
    },
    services::offline_queue::OfflineQueue,
};

/// Queue a batch of transactions.
///
/// # Request Body
///
/// ```json
/// {
///   "transactions": [
///     { "transaction_id": "t-1", "sender_id": "acc-1", "receiver_id": "acc-2", "amount_cents": 500 }
///   ]
/// }
/// ```
///
/// A batch containing any malformed transaction is rejected whole.
pub async fn enqueue(
    State(queue): State<Arc<OfflineQueue>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<EnqueueRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let count = queue.enqueue(request.transactions).await?;
    let queued = queue.len().await;
    tracing::debug!(caller = %auth.caller, count, queued, "Accepted offline batch");
    Ok(Json(StatusResponse::new("Transactions queued for offline processing")))
}

pub async fn list_pending(State(queue): State<Arc<OfflineQueue>>) -> Json<Vec<QueuedPaymentView>> {
    Json(queue.pending().await)
}

pub fn router(queue: Arc<OfflineQueue>, signer: Arc<TokenSigner>) -> Router {
    Router::new()
        .route("/offline-queue", post(enqueue).get(list_pending))
        .route_layer(axum_middleware::from_fn_with_state(signer, auth_middleware))
        .with_state(queue)
}
