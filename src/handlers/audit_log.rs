//! Audit-log sink HTTP handler.
//!
//! - POST /audit - Append one outcome record

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};

use crate::{
    error::AppError,
    models::{registry::StatusResponse, transaction::AuditRecord},
    services::audit_log::AuditLog,
};

pub async fn append(
    State(log): State<Arc<AuditLog>>,
    Json(record): Json<AuditRecord>,
) -> Result<Json<StatusResponse>, AppError> {
    log.append(&record).await.inspect_err(|e| {
        tracing::error!(transaction_id = %record.transaction_id, error = %e, "Failed to append audit record");
    })?;
    Ok(Json(StatusResponse::new("Logged")))
}

pub fn router(log: Arc<AuditLog>) -> Router {
    Router::new().route("/audit", post(append)).with_state(log)
}
