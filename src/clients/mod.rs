//! Seams between services.
//!
//! The coordinator, offline queue and heartbeat talk to registries,
//! participants and the audit log only through these traits. The HTTP
//! implementations live in [`http`]; the in-process types (`Registry`,
//! `AuditLog`) implement them directly so they can be wired without a network hop.

pub mod http;

pub use http::{HttpAuditSink, HttpParticipantClient, HttpRegistryClient};

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{account::CheckFundsResponse, transaction::AuditRecord},
};

/// Discovery operations of one pool registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn register(&self, address: &str) -> Result<(), AppError>;

    async fn report_load(&self, address: &str, sample: f64) -> Result<(), AppError>;

    /// Least-loaded instance.
    async fn select(&self) -> Result<String, AppError>;

    /// Every instance, in registry order.
    async fn list(&self) -> Result<Vec<String>, AppError>;
}

/// Ledger operations on the participant reachable at `address`.
#[async_trait]
pub trait ParticipantClient: Send + Sync {
    async fn check_funds(
        &self,
        address: &str,
        account_number: &str,
        amount_cents: i64,
    ) -> Result<CheckFundsResponse, AppError>;

    async fn debit(
        &self,
        address: &str,
        account_number: &str,
        amount_cents: i64,
    ) -> Result<bool, AppError>;

    async fn acknowledge_abort(&self, address: &str, transaction_id: &str)
    -> Result<(), AppError>;
}

/// Durable sink for transaction outcomes.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), AppError>;
}
