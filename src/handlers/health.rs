//! Health check endpoint for service monitoring.

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ServiceRole;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Which role this process runs
    pub role: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "role": "participant",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
pub async fn health_check(State(role): State<ServiceRole>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        role: role.as_str().to_string(),
        timestamp: Utc::now(),
    })
}

pub fn router(role: ServiceRole) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(role)
}
