//! Error types and HTTP error response handling.
//!
//! This module defines all application errors, how they are converted
//! into HTTP responses, and how the inter-service clients turn an error
//! response body back into the matching variant.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Registry Errors**: empty pool, heartbeat for an unknown address
/// - **Ledger Errors**: unknown account, insufficient funds
/// - **Protocol Errors**: rejected vote, failed commit, no participants
/// - **Gateway Errors**: bad or missing bearer token, unknown transaction
/// - **Transport Errors**: HTTP or file I/O failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The registry has no instances to select from.
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("No instance available")]
    NoInstanceAvailable,

    /// A load report arrived for an address that never registered.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Instance not found")]
    InstanceNotFound,

    /// The account number is unknown to this participant.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Account not found")]
    AccountNotFound,

    /// Balance does not strictly exceed the requested amount.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// A participant declined, errored, or did not answer in time during prepare.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Vote rejected")]
    VoteRejected,

    /// A participant debit failed after a unanimous prepare.
    ///
    /// Returns HTTP 409 Conflict. Which participant failed is never exposed.
    #[error("Commit failed")]
    CommitFailed,

    /// The participant registry listed no participants.
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("No participants available")]
    NoParticipantsAvailable,

    /// Bearer token is missing, malformed, tampered or expired.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid token")]
    InvalidToken,

    /// The gateway never saw this transaction id.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Calling another service failed (connect, timeout, bad body).
    ///
    /// Returns HTTP 502 Bad Gateway.
    #[error("Upstream error: {0}")]
    Http(#[from] reqwest::Error),

    /// Another service answered with an error this process cannot classify.
    ///
    /// Returns HTTP 502 Bad Gateway.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Encoding a bearer token failed.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// Local file I/O failed (audit log).
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Stable machine-readable code used in the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NoInstanceAvailable => "no_instance_available",
            AppError::InstanceNotFound => "instance_not_found",
            AppError::AccountNotFound => "account_not_found",
            AppError::InsufficientFunds => "insufficient_funds",
            AppError::VoteRejected => "vote_rejected",
            AppError::CommitFailed => "commit_failed",
            AppError::NoParticipantsAvailable => "no_participants_available",
            AppError::InvalidToken => "invalid_token",
            AppError::TransactionNotFound => "transaction_not_found",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Http(_) | AppError::Upstream(_) => "upstream_error",
            AppError::Signing(_) | AppError::Io(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NoInstanceAvailable | AppError::NoParticipantsAvailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::InstanceNotFound
            | AppError::AccountNotFound
            | AppError::TransactionNotFound => StatusCode::NOT_FOUND,
            AppError::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::VoteRejected | AppError::CommitFailed => StatusCode::CONFLICT,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Http(_) | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Signing(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rebuild an error from the `{"error": {"code", "message"}}` body another
    /// service of this suite returned.
    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            "no_instance_available" => AppError::NoInstanceAvailable,
            "instance_not_found" => AppError::InstanceNotFound,
            "account_not_found" => AppError::AccountNotFound,
            "insufficient_funds" => AppError::InsufficientFunds,
            "vote_rejected" => AppError::VoteRejected,
            "commit_failed" => AppError::CommitFailed,
            "no_participants_available" => AppError::NoParticipantsAvailable,
            "invalid_token" => AppError::InvalidToken,
            "transaction_not_found" => AppError::TransactionNotFound,
            "invalid_request" => AppError::InvalidRequest(message),
            _ => AppError::Upstream(message),
        }
    }
}

/// Wire shape of an error response, used when decoding another service's reply.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Transport and I/O failures hide their details from the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::Http(_) | AppError::Upstream(_) => "An upstream service failed".to_string(),
            AppError::Signing(_) | AppError::Io(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (self.status(), body).into_response()
    }
}
