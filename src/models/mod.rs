//! Data models shared by the services and their HTTP surfaces.
//!
//! Request/response bodies live next to the entity they describe.

/// Registry instances and registry request bodies
pub mod registry;
/// Ledger accounts and participant request bodies
pub mod account;
/// Transactions, queue entries and audit records
pub mod transaction;
