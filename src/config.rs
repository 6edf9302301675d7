//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct.

use serde::Deserialize;

use crate::services::registry::RegistryPolicy;

/// Which service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceRole {
    Registry,
    Participant,
    Coordinator,
    OfflineQueue,
    AuditLog,
    Gateway,
    /// Print a bearer token and exit.
    IssueToken,
}

impl ServiceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Registry => "registry",
            ServiceRole::Participant => "participant",
            ServiceRole::Coordinator => "coordinator",
            ServiceRole::OfflineQueue => "offline-queue",
            ServiceRole::AuditLog => "audit-log",
            ServiceRole::Gateway => "gateway",
            ServiceRole::IssueToken => "issue-token",
        }
    }
}

/// Which pool a registry process discovers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RegistryPool {
    #[default]
    Participants,
    Auth,
}

impl RegistryPool {
    pub fn policy(&self) -> RegistryPolicy {
        match self {
            RegistryPool::Participants => RegistryPolicy::participants(),
            RegistryPool::Auth => RegistryPolicy::auth_services(),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `SERVICE_ROLE` (required): one of `registry`, `participant`, `coordinator`,
///   `offline-queue`, `audit-log`, `gateway`, `issue-token`
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `ADVERTISE_ADDRESS` (optional): base URL other services reach this instance at
/// - `REGISTRY_URL` (optional): base URL of the pool registry this role talks to
/// - `REGISTRY_POOL` (optional): `participants` or `auth`, defaults to `participants`
/// - `AUDIT_LOG_URL` (optional): base URL of the audit-log sink
/// - `AUDIT_LOG_PATH` (optional): file the audit-log role appends to
/// - `AUTH_SECRET` (optional): HMAC key for bearer tokens
/// - `TOKEN_CALLER`, `TOKEN_TTL_SECS` (optional): used by `issue-token`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service_role: ServiceRole,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub advertise_address: Option<String>,

    pub registry_url: Option<String>,

    #[serde(default)]
    pub registry_pool: RegistryPool,

    pub audit_log_url: Option<String>,

    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: String,

    pub auth_secret: Option<String>,

    #[serde(default = "default_token_caller")]
    pub token_caller: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_audit_log_path() -> String {
    "transactions.log".to_string()
}

fn default_token_caller() -> String {
    "operator".to_string()
}

/// 24 hours.
fn default_token_ttl() -> u64 {
    24 * 60 * 60
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if `SERVICE_ROLE` is missing or any value cannot be parsed.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// The address this instance advertises, falling back to localhost on the bound port.
    pub fn advertise_address(&self) -> String {
        self.advertise_address
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.server_port))
    }

    pub fn require_registry_url(&self) -> anyhow::Result<&str> {
        self.registry_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "REGISTRY_URL is required for the {} role",
                self.service_role.as_str()
            )
        })
    }

    pub fn require_audit_log_url(&self) -> anyhow::Result<&str> {
        self.audit_log_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "AUDIT_LOG_URL is required for the {} role",
                self.service_role.as_str()
            )
        })
    }
}
