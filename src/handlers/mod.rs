//! HTTP request handlers (route handlers).
//!
//! Each module owns the routes of one service role and exposes a `router`
//! that binds them to that role's state. `main` merges the router of the
//! configured role with the health route.

/// Audit-log append endpoint
pub mod audit_log;
/// Two-phase-commit coordinator endpoints
pub mod coordinator;
/// Front-door transaction intake endpoints
pub mod gateway;
/// Liveness endpoint
pub mod health;
/// Offline-queue enqueue and inspection endpoints
pub mod offline_queue;
/// Account-ledger participant endpoints
pub mod participant;
/// Pool registry endpoints
pub mod registry;
