//! Business logic services.
//!
//! Services hold the state and algorithms of each role, independent of HTTP.

pub mod audit_log;
pub mod coordinator;
pub mod heartbeat;
pub mod intake;
pub mod ledger;
pub mod offline_queue;
pub mod registry;
