//! Request bodies posted by the host and the generic acknowledgement.

use crate::CallId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one call, posted to `/response`.
///
/// The id is kept as the raw string the host sent back: an id that does not
/// parse simply matches no pending call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ResponseEnvelope {
    pub fn success(id: CallId, response: Value) -> Self {
        Self {
            request_id: id.to_string(),
            response,
            error: None,
        }
    }

    pub fn failure(id: CallId, error: impl Into<Value>) -> Self {
        Self {
            request_id: id.to_string(),
            response: Value::Null,
            error: Some(error.into()),
        }
    }

    /// The call this envelope settles, if the id is well formed.
    pub fn call_id(&self) -> Option<CallId> {
        CallId::parse(&self.request_id).ok()
    }

    /// `Err` when an error is present, whatever `response` holds.
    pub fn into_outcome(self) -> Result<Value, Value> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.response),
        }
    }
}

/// Sent by the host on `/ready`. The gateway does not inspect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadySignal {
    pub plugin_ready: bool,
    pub timestamp: u64,
}

impl ReadySignal {
    pub fn now() -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            plugin_ready: true,
            timestamp,
        }
    }
}

/// `{"success": true}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
