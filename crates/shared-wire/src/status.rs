//! Read-only snapshots served by `/health` and `/status`.

use serde::{Deserialize, Serialize};

/// Lifetime counters of the call correlator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStats {
    pub registered: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub flushed: u64,
}

/// `GET /status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Host liveness, derived from the last poll/ready.
    pub plugin_connected: bool,
    /// Caller liveness, derived from the last caller activity.
    pub mcp_server_active: bool,
    /// Epoch milliseconds of the last caller activity.
    #[serde(rename = "lastMCPActivity")]
    pub last_mcp_activity: Option<u64>,
    /// Milliseconds since the caller was activated, 0 when inactive.
    pub uptime: u64,
    pub pending_calls: usize,
    #[serde(default)]
    pub stats: CallStats,
}

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: String,
    pub service: String,
    /// Raw "host said it is connected" flag, not windowed.
    pub plugin_connected: bool,
    pub mcp_server_active: bool,
    pub uptime: u64,
}
