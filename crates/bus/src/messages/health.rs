//! Worker heartbeat payload.

use serde::{Deserialize, Serialize};

/// Worker health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Periodic heartbeat published by every worker on
/// [`WORKER_HEALTH`](super::topics::WORKER_HEALTH).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub worker_id: String,
    pub status: WorkerStatus,
    /// Messages the worker has handled since it started.
    pub handled: u64,
    /// Seconds since the worker started.
    pub uptime_secs: u64,
}
