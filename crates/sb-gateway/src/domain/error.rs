//! Bridge error types and the JSON-RPC 2.0 error value used by the caller front.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Standard JSON-RPC 2.0 error codes
pub mod codes {
    // JSON-RPC 2.0 standard errors (-32700 to -32600)
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Server errors (-32000 to -32099)
    pub const RESOURCE_UNAVAILABLE: i32 = -32002;
    pub const TIMEOUT: i32 = -32006;
}

/// Why a submitted call was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    /// No response arrived within the call timeout. The caller may resubmit.
    #[error("Request timeout: {endpoint} got no response within {after:?}")]
    Timeout { endpoint: String, after: Duration },

    /// The host session ended (disconnect, reconnect or liveness loss) while
    /// the call was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The host executed the call and reported an error.
    #[error("remote error: {0}")]
    Remote(Value),
}

/// Negative lock outcomes. Returned as data, never as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("No lock found for: {key}")]
    NotFound { key: String },

    #[error("Lock held by {holder}, not {requester}")]
    NotHolder {
        key: String,
        holder: String,
        requester: String,
    },
}

/// JSON-RPC error with code
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// JSON-RPC error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional data
    pub data: Option<Value>,
}

impl ApiError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Parse error - invalid JSON
    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(
            codes::PARSE_ERROR,
            format!("Parse error: {}", details.into()),
        )
    }

    /// Invalid request - not a valid JSON-RPC request
    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_REQUEST,
            format!("Invalid request: {}", details.into()),
        )
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_PARAMS,
            format!("Invalid params: {}", details.into()),
        )
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            format!("Internal error: {}", details.into()),
        )
    }

    pub fn resource_unavailable(details: impl Into<String>) -> Self {
        Self::new(
            codes::RESOURCE_UNAVAILABLE,
            format!("Resource unavailable: {}", details.into()),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ApiError", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if let Some(ref data) = self.data {
            state.serialize_field("data", data)?;
        }
        state.end()
    }
}

/// Syntax errors are parse errors; anything else is a params mismatch.
impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_syntax() || e.is_eof() {
            ApiError::parse_error(e.to_string())
        } else {
            ApiError::invalid_params(e.to_string())
        }
    }
}

impl From<CallError> for ApiError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Timeout { endpoint, after } => ApiError::with_data(
                codes::TIMEOUT,
                format!("Request timeout: {endpoint}"),
                serde_json::json!({ "timeoutMs": after.as_millis() as u64 }),
            ),
            CallError::ConnectionClosed => ApiError::resource_unavailable("Connection closed"),
            CallError::Remote(data) => {
                let message = match &data {
                    Value::String(s) => s.clone(),
                    _ => "remote procedure failed".to_string(),
                };
                ApiError::with_data(codes::INTERNAL_ERROR, message, data)
            }
        }
    }
}

/// Result type for JSON-RPC operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway-level errors (not JSON-RPC, internal use)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Path that is not part of the bridge contract
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("internal error: {0}")]
    Internal(String),
}
