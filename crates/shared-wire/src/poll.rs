//! `GET /poll` response body.

use crate::CallId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One call surfaced to the host: the procedure to run and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolledRequest {
    pub endpoint: String,
    #[serde(default)]
    pub data: Value,
}

/// Body of every `/poll` answer, 200 or 503.
///
/// `request` is always present on the wire and is `null` when nothing is
/// pending. `requestId` is only present alongside a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    #[serde(default)]
    pub request: Option<PolledRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<CallId>,
    pub mcp_connected: bool,
    pub plugin_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PollResponse {
    /// Caller side is offline; the host is told so and given nothing to do.
    pub fn caller_offline() -> Self {
        Self {
            request: None,
            request_id: None,
            mcp_connected: false,
            plugin_connected: true,
            error: Some("MCP server not connected".to_string()),
        }
    }

    /// Caller is online but nothing is pending.
    pub fn idle() -> Self {
        Self {
            request: None,
            request_id: None,
            mcp_connected: true,
            plugin_connected: true,
            error: None,
        }
    }

    /// Caller is online and `id` is the oldest pending call.
    pub fn with_call(id: CallId, endpoint: impl Into<String>, data: Value) -> Self {
        Self {
            request: Some(PolledRequest {
                endpoint: endpoint.into(),
                data,
            }),
            request_id: Some(id),
            ..Self::idle()
        }
    }

    /// The call to execute, if the poll delivered one with an id.
    pub fn delivered_call(&self) -> Option<(CallId, &PolledRequest)> {
        match (&self.request, self.request_id) {
            (Some(req), Some(id)) => Some((id, req)),
            _ => None,
        }
    }
}
