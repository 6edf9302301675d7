//! Ledger Commit - Service Entry Point
//!
//! One binary runs every service of the suite; `SERVICE_ROLE` picks which.
//!
//! # Roles
//!
//! - **registry**: directory of one pool with least-load selection
//! - **participant**: account ledger voting in and executing debits
//! - **coordinator**: two-phase commit across every registered participant
//! - **offline-queue**: background retry of debits that failed earlier
//! - **audit-log**: append-only record of transaction outcomes
//! - **gateway**: front-door intake and status tracking
//! - **issue-token**: print a bearer token and exit
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Build the role's state and HTTP router
//! 3. Join the pool registry and start the heartbeat (pooled roles)
//! 4. Start server on configured port

mod clients;
mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::{
    clients::{HttpAuditSink, HttpParticipantClient, HttpRegistryClient, RegistryClient},
    config::{Config, ServiceRole},
    middleware::auth::TokenSigner,
    services::{
        audit_log::AuditLog,
        coordinator::Coordinator,
        heartbeat::{self, CpuLoadSampler, REPORT_INTERVAL},
        intake::TransactionIntake,
        ledger::Ledger,
        offline_queue::{OfflineQueue, RetryPolicy},
        registry::Registry,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!(role = config.service_role.as_str(), "Configuration loaded");

    if config.service_role == ServiceRole::IssueToken {
        let signer = TokenSigner::from_secret(config.auth_secret.as_deref());
        let token = signer.issue(&config.token_caller, Duration::from_secs(config.token_ttl_secs))?;
        println!("{}", token);
        return Ok(());
    }

    let app = role_router(&config)
        .await?
        .merge(handlers::health::router(config.service_role))
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(role = config.service_role.as_str(), "Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the state and routes of the configured role, starting any
/// background task it owns.
async fn role_router(config: &Config) -> anyhow::Result<Router> {
    let router = match config.service_role {
        ServiceRole::Registry => {
            let registry = Arc::new(Registry::new(config.registry_pool.policy()));
            tracing::info!(pool = ?config.registry_pool, "Serving registry");
            handlers::registry::router(registry)
        }
        ServiceRole::Participant => {
            let registry: Arc<dyn RegistryClient> =
                Arc::new(HttpRegistryClient::new(config.require_registry_url()?)?);
            join_pool(config, registry).await?;
            handlers::participant::router(Arc::new(Ledger::new()))
        }
        ServiceRole::Coordinator => {
            let coordinator = Coordinator::new(
                Arc::new(HttpRegistryClient::new(config.require_registry_url()?)?),
                Arc::new(HttpParticipantClient::new()?),
                Arc::new(HttpAuditSink::new(config.require_audit_log_url()?)?),
            );
            handlers::coordinator::router(Arc::new(coordinator), signer(config))
        }
        ServiceRole::OfflineQueue => {
            let queue = Arc::new(OfflineQueue::new(
                Arc::new(HttpRegistryClient::new(config.require_registry_url()?)?),
                Arc::new(HttpParticipantClient::new()?),
                RetryPolicy::default(),
            ));
            tokio::spawn(queue.clone().run());
            handlers::offline_queue::router(queue, signer(config))
        }
        ServiceRole::AuditLog => {
            let log = AuditLog::open(&config.audit_log_path).await?;
            tracing::info!(path = %log.path().display(), "Audit log opened");
            handlers::audit_log::router(Arc::new(log))
        }
        ServiceRole::Gateway => {
            if let Some(url) = config.registry_url.as_deref() {
                join_pool(config, Arc::new(HttpRegistryClient::new(url)?)).await?;
            } else {
                tracing::info!("REGISTRY_URL not set, gateway runs outside any pool");
            }
            handlers::gateway::router(Arc::new(TransactionIntake::new()), signer(config))
        }
        ServiceRole::IssueToken => {
            anyhow::bail!("issue-token does not serve HTTP")
        }
    };

    Ok(router)
}

/// Register this instance and keep its load sample fresh.
async fn join_pool(config: &Config, registry: Arc<dyn RegistryClient>) -> anyhow::Result<()> {
    let address = config.advertise_address();
    heartbeat::register_instance(registry.as_ref(), &address).await?;
    tokio::spawn(heartbeat::report_load_periodically(
        registry,
        address,
        CpuLoadSampler::new(),
        REPORT_INTERVAL,
    ));
    Ok(())
}

fn signer(config: &Config) -> Arc<TokenSigner> {
    Arc::new(TokenSigner::from_secret(config.auth_secret.as_deref()))
}
