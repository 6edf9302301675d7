//! Pool registry HTTP handlers.
//!
//! - POST /registry/register - Register an instance
//! - POST /registry/load - Report an instance's load sample
//! - GET /registry/select - Least-loaded instance
//! - GET /registry/instances - All instances in registration order

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    error::AppError,
    models::registry::{
        InstanceListResponse, InstanceResponse, LoadReport, RegisterRequest, StatusResponse,
    },
    services::registry::Registry,
};

/// Register an instance.
///
/// # Request Body
///
/// ```json
/// { "address": "http://10.0.0.7:4001" }
/// ```
///
/// Registering a known address again succeeds without changing its sample.
pub async fn register(
    State(registry): State<Arc<Registry>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let created = registry.register(&request.address).await?;
    let status = if created {
        "Instance registered"
    } else {
        "Instance already registered"
    };
    Ok(Json(StatusResponse::new(status)))
}

/// Replace an instance's load sample.
///
/// # Errors
///
/// - 404 `instance_not_found` for an address that never registered
pub async fn report_load(
    State(registry): State<Arc<Registry>>,
    Json(report): Json<LoadReport>,
) -> Result<Json<StatusResponse>, AppError> {
    registry.report_load(&report.address, report.sample).await?;
    Ok(Json(StatusResponse::new("Load updated")))
}

/// Pick the least-loaded instance.
///
/// # Errors
///
/// - 503 `no_instance_available` when the pool is empty
pub async fn select(
    State(registry): State<Arc<Registry>>,
) -> Result<Json<InstanceResponse>, AppError> {
    let address = registry.select().await?;
    Ok(Json(InstanceResponse { address }))
}

pub async fn list(State(registry): State<Arc<Registry>>) -> Json<InstanceListResponse> {
    Json(InstanceListResponse {
        addresses: registry.list().await,
    })
}

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/registry/register", post(register))
        .route("/registry/load", post(report_load))
        .route("/registry/select", get(select))
        .route("/registry/instances", get(list))
        .with_state(registry)
}
