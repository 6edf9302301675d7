//! Registry data models and API request/response types.

use serde::{Deserialize, Serialize};

/// One live instance of a replicated service pool.
///
/// Unique by `address` within a registry. Instances are never evicted; only
/// their load sample changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Base URL the instance is reachable at (e.g. `http://10.0.0.7:4001`)
    pub address: String,

    /// Most recent load sample. Lower is preferred by selection.
    pub load_sample: f64,
}

/// Body of `POST /registry/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub address: String,
}

/// Body of `POST /registry/load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub address: String,
    pub sample: f64,
}

/// Response of `GET /registry/select`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceResponse {
    pub address: String,
}

/// Response of `GET /registry/instances`, in registration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceListResponse {
    pub addresses: Vec<String>,
}

/// Generic acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}
