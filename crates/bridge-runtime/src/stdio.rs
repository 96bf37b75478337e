//! Line-delimited JSON-RPC 2.0 over stdin/stdout.
//!
//! This is the caller's side of the bridge. Lines are dispatched in the
//! order they are read; a `bridge.call` then waits for the host on its own
//! task so it never blocks lock or activity calls queued behind it.
//! Responses are written by a single writer task, one JSON object per line,
//! in completion order.

use sb_gateway::domain::PendingCallHandle;
use sb_gateway::{ApiError, ApiResult, ConnectionGateway};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const JSONRPC_VERSION: &str = "2.0";

/// Longest lock a caller may request: one day.
pub const MAX_LOCK_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Incoming request. A missing `id` makes it a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl RpcResponse {
    pub fn new(id: Value, outcome: ApiResult<Value>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
            error,
        }
    }

    pub fn failure(id: Value, error: ApiError) -> Self {
        Self::new(id, Err(error))
    }
}

/// Methods served on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    BridgeCall,
    BridgeStatus,
    LocksAcquire,
    LocksRelease,
    LocksList,
    ActivityReport,
    ActivityList,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Self::BridgeCall,
        Self::BridgeStatus,
        Self::LocksAcquire,
        Self::LocksRelease,
        Self::LocksList,
        Self::ActivityReport,
        Self::ActivityList,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BridgeCall => "bridge.call",
            Self::BridgeStatus => "bridge.status",
            Self::LocksAcquire => "locks.acquire",
            Self::LocksRelease => "locks.release",
            Self::LocksList => "locks.list",
            Self::ActivityReport => "activity.report",
            Self::ActivityList => "activity.list",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    endpoint: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcquireParams {
    key: String,
    agent_id: String,
    #[serde(default)]
    ttl_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseParams {
    key: String,
    agent_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportParams {
    agent_id: String,
    action: String,
    #[serde(default)]
    key: Option<String>,
}

fn parse_params<T: DeserializeOwned>(params: Value) -> ApiResult<T> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    Ok(serde_json::from_value(params)?)
}

fn require(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::invalid_params(format!("{field} is required")));
    }
    Ok(())
}

fn to_result<T: Serialize>(value: T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::internal(e.to_string()))
}

/// What a method produced when it was dispatched.
#[derive(Debug)]
pub enum Dispatched {
    /// Answered on the spot.
    Done(Value),
    /// Registered with the correlator; the result arrives from the host.
    Call(PendingCallHandle),
}

impl Dispatched {
    pub async fn settle(self) -> ApiResult<Value> {
        match self {
            Self::Done(value) => Ok(value),
            Self::Call(handle) => Ok(handle.await?),
        }
    }
}

/// Execute one method against the gateway.
///
/// Never waits: a `bridge.call` is registered before this returns, so a
/// flush that runs afterwards is guaranteed to see it.
pub fn dispatch(gateway: &ConnectionGateway, method: Method, params: Value) -> ApiResult<Dispatched> {
    let value = match method {
        Method::BridgeCall => {
            let p: CallParams = parse_params(params)?;
            require("endpoint", &p.endpoint)?;
            return Ok(Dispatched::Call(gateway.submit(p.endpoint, p.data)));
        }
        Method::BridgeStatus => to_result(gateway.status())?,
        Method::LocksAcquire => {
            let p: AcquireParams = parse_params(params)?;
            require("key", &p.key)?;
            require("agentId", &p.agent_id)?;
            if let Some(ttl_ms) = p.ttl_ms {
                if ttl_ms == 0 || ttl_ms > MAX_LOCK_TTL_MS {
                    return Err(ApiError::invalid_params(format!(
                        "ttlMs must be between 1 and {MAX_LOCK_TTL_MS}"
                    )));
                }
            }
            let ttl = p.ttl_ms.map(Duration::from_millis);
            to_result(gateway.locks().acquire(&p.key, &p.agent_id, ttl))?
        }
        Method::LocksRelease => {
            let p: ReleaseParams = parse_params(params)?;
            require("key", &p.key)?;
            require("agentId", &p.agent_id)?;
            to_result(gateway.locks().release(&p.key, &p.agent_id))?
        }
        Method::LocksList => to_result(gateway.locks().list())?,
        Method::ActivityReport => {
            let p: ReportParams = parse_params(params)?;
            require("agentId", &p.agent_id)?;
            require("action", &p.action)?;
            let key = p.key.filter(|k| !k.is_empty());
            to_result(gateway.activity().report(p.agent_id, p.action, key))?
        }
        Method::ActivityList => to_result(gateway.activity().get_all())?,
    };
    Ok(Dispatched::Done(value))
}

/// One input line after parsing and dispatch.
#[derive(Debug)]
pub enum Accepted {
    /// Nothing left to wait for. `None` for notifications.
    Answered(Option<RpcResponse>),
    /// A `bridge.call` waiting on the host.
    Waiting { id: Option<Value>, call: PendingCallHandle },
}

impl Accepted {
    pub async fn finish(self) -> Option<RpcResponse> {
        match self {
            Self::Answered(response) => response,
            Self::Waiting { id, call } => {
                let outcome = Dispatched::Call(call).settle().await;
                if let Err(e) = &outcome {
                    debug!(code = e.code, "Call failed: {}", e.message);
                }
                id.map(|id| RpcResponse::new(id, outcome))
            }
        }
    }
}

/// Parse and dispatch one input line without waiting on the host.
pub fn accept(gateway: &ConnectionGateway, line: &str) -> Accepted {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Unparseable request line");
            return Accepted::Answered(Some(RpcResponse::failure(Value::Null, e.into())));
        }
    };

    let raw_id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: RpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            return Accepted::Answered(Some(RpcResponse::failure(
                raw_id,
                ApiError::invalid_request(e.to_string()),
            )))
        }
    };
    if request.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
        return Accepted::Answered(Some(RpcResponse::failure(
            raw_id,
            ApiError::invalid_request("jsonrpc must be \"2.0\""),
        )));
    }

    gateway.touch_caller();

    let outcome = match Method::from_name(&request.method) {
        Some(method) => {
            debug!(method = method.name(), "Handling request");
            dispatch(gateway, method, request.params)
        }
        None => Err(ApiError::method_not_found(&request.method)),
    };
    match outcome {
        Ok(Dispatched::Call(call)) => Accepted::Waiting { id: request.id, call },
        Ok(Dispatched::Done(value)) => {
            Accepted::Answered(request.id.map(|id| RpcResponse::new(id, Ok(value))))
        }
        Err(e) => {
            debug!(method = %request.method, code = e.code, "Request failed: {}", e.message);
            Accepted::Answered(request.id.map(|id| RpcResponse::failure(id, e)))
        }
    }
}

/// Handle one input line to completion. `None` for notifications.
pub async fn handle_line(gateway: &ConnectionGateway, line: &str) -> Option<RpcResponse> {
    accept(gateway, line).finish().await
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<RpcResponse>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = match serde_json::to_vec(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Dropping unserializable response");
                continue;
            }
        };
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Serve requests from `reader` until EOF, writing responses to `writer`.
///
/// The caller is active for the lifetime of the stream. Lines are dispatched
/// in the read loop and only the wait for a host result runs on its own
/// task. On EOF nobody is left to read results, so every call still pending
/// is flushed before the remaining responses are written out.
pub async fn serve<R, W>(gateway: Arc<ConnectionGateway>, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    gateway.activate_caller();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_responses(writer, rx));
    let mut waiting = JoinSet::new();

    let mut lines = BufReader::new(reader).lines();
    let read_result = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match accept(&gateway, &line) {
                    Accepted::Answered(Some(response)) => {
                        let _ = tx.send(response);
                    }
                    Accepted::Answered(None) => {}
                    pending @ Accepted::Waiting { .. } => {
                        let tx = tx.clone();
                        waiting.spawn(async move {
                            if let Some(response) = pending.finish().await {
                                let _ = tx.send(response);
                            }
                        });
                    }
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    gateway.deactivate_caller();
    let flushed = gateway.correlator().disconnect_all();
    info!(flushed, "Input closed, stdio front stopping");

    while waiting.join_next().await.is_some() {}
    drop(tx);
    writer_task.await.map_err(io::Error::other)??;
    read_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_gateway::domain::error::codes;
    use sb_gateway::BridgeConfig;
    use serde_json::json;
    use shared_wire::ResponseEnvelope;
    use tokio::io::AsyncReadExt;

    fn gateway() -> Arc<ConnectionGateway> {
        Arc::new(ConnectionGateway::new(&BridgeConfig::default()))
    }

    fn request(id: u64, method: &str, params: Value) -> String {
        json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}).to_string()
    }

    async fn call(gateway: &ConnectionGateway, method: &str, params: Value) -> RpcResponse {
        handle_line(gateway, &request(1, method, params)).await.unwrap()
    }

    #[test]
    fn test_method_names_round_trip() {
        for method in Method::ALL {
            assert_eq!(Method::from_name(method.name()), Some(method));
        }
        assert_eq!(Method::from_name("tools/list"), None);
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let gateway = gateway();
        let response = handle_line(&gateway, "{not json").await.unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_missing_method_is_invalid_request() {
        let gateway = gateway();
        let response = handle_line(&gateway, r#"{"jsonrpc":"2.0","id":7}"#).await.unwrap();
        assert_eq!(response.id, json!(7));
        assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);

        let response = handle_line(&gateway, r#"{"id":8,"method":"locks.list"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let gateway = gateway();
        let response = call(&gateway, "tools/list", Value::Null).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, codes::METHOD_NOT_FOUND);
        assert!(error.message.contains("tools/list"));
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let gateway = gateway();
        let line = r#"{"jsonrpc":"2.0","method":"activity.report","params":{"agentId":"a","action":"x"}}"#;
        assert!(handle_line(&gateway, line).await.is_none());
        assert_eq!(gateway.activity().len(), 1);
    }

    #[tokio::test]
    async fn test_lock_conflict_and_release() {
        let gateway = gateway();
        let first = call(&gateway, "locks.acquire", json!({"key": "Workspace.Part", "agentId": "a"})).await;
        assert_eq!(first.result.as_ref().unwrap()["acquired"], json!(true));

        let second = call(&gateway, "locks.acquire", json!({"key": "Workspace.Part", "agentId": "b"})).await;
        let grant = second.result.unwrap();
        assert_eq!(grant["acquired"], json!(false));
        assert_eq!(grant["holder"], json!("a"));

        let refused = call(&gateway, "locks.release", json!({"key": "Workspace.Part", "agentId": "b"})).await;
        assert_eq!(
            refused.result.unwrap(),
            json!({"released": false, "error": "Lock held by a, not b"})
        );

        let released = call(&gateway, "locks.release", json!({"key": "Workspace.Part", "agentId": "a"})).await;
        assert_eq!(released.result.unwrap(), json!({"released": true}));

        let listed = call(&gateway, "locks.list", Value::Null).await;
        assert_eq!(listed.result.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_lock_params_are_validated() {
        let gateway = gateway();
        for params in [
            json!({"key": "", "agentId": "a"}),
            json!({"key": "k", "agentId": "  "}),
            json!({"key": "k"}),
            json!({"key": "k", "agentId": "a", "ttlMs": 0}),
            json!({"key": "k", "agentId": "a", "ttlMs": u64::MAX}),
            json!({"key": "k", "agentId": "a", "ttlMs": MAX_LOCK_TTL_MS + 1}),
        ] {
            let response = call(&gateway, "locks.acquire", params).await;
            assert_eq!(response.error.unwrap().code, codes::INVALID_PARAMS);
        }
        let response = call(&gateway, "locks.release", json!({"key": "k", "agentId": ""})).await;
        assert_eq!(response.error.unwrap().code, codes::INVALID_PARAMS);
        assert!(gateway.locks().list().is_empty());
    }

    #[tokio::test]
    async fn test_longest_lock_can_be_renewed() {
        let gateway = gateway();
        let params = json!({"key": "k", "agentId": "a", "ttlMs": MAX_LOCK_TTL_MS});
        let first = call(&gateway, "locks.acquire", params.clone()).await.result.unwrap();
        let renewed = call(&gateway, "locks.acquire", params).await.result.unwrap();
        assert_eq!(renewed["acquired"], json!(true));
        assert!(renewed["expiresAt"].as_u64() > first["expiresAt"].as_u64());
    }

    #[tokio::test]
    async fn test_activity_report_and_list() {
        let gateway = gateway();
        call(&gateway, "activity.report", json!({"agentId": "a", "action": "edit", "key": "Workspace"})).await;
        call(&gateway, "activity.report", json!({"agentId": "b", "action": "read"})).await;

        let listed = call(&gateway, "activity.list", Value::Null).await.result.unwrap();
        let entries = listed.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["agentId"], json!("a"));
        assert_eq!(entries[0]["resourceKey"], json!("Workspace"));
        assert!(entries[1].get("resourceKey").is_none());
    }

    #[tokio::test]
    async fn test_status_reports_caller_activity() {
        let gateway = gateway();
        gateway.activate_caller();
        let status = call(&gateway, "bridge.status", Value::Null).await.result.unwrap();
        assert_eq!(status["mcpServerActive"], json!(true));
        assert_eq!(status["pendingCalls"], json!(0));
    }

    #[tokio::test]
    async fn test_bridge_call_round_trip() {
        let gateway = gateway();
        gateway.activate_caller();
        gateway.ready();

        let task = {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                call(&gateway, "bridge.call", json!({"endpoint": "/api/get-selection", "data": {}})).await
            })
        };

        let id = loop {
            if let Some((id, request)) = gateway.poll().body.delivered_call() {
                assert_eq!(request.endpoint, "/api/get-selection");
                break id;
            }
            tokio::task::yield_now().await;
        };
        assert!(gateway.respond(ResponseEnvelope::success(id, json!(["Workspace.Part"]))));

        let response = task.await.unwrap();
        assert_eq!(response.result, Some(json!(["Workspace.Part"])));
    }

    #[tokio::test]
    async fn test_bridge_call_remote_error_maps_to_internal() {
        let gateway = gateway();
        gateway.activate_caller();

        let task = {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                call(&gateway, "bridge.call", json!({"endpoint": "/api/delete-object"})).await
            })
        };
        let id = loop {
            if let Some((id, _)) = gateway.poll().body.delivered_call() {
                break id;
            }
            tokio::task::yield_now().await;
        };
        gateway.respond(ResponseEnvelope::failure(id, "Instance not found"));

        let error = task.await.unwrap().error.unwrap();
        assert_eq!(error.code, codes::INTERNAL_ERROR);
        assert_eq!(error.message, "Instance not found");
        assert_eq!(error.data, Some(json!("Instance not found")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_call_timeout_code() {
        let mut config = BridgeConfig::default();
        config.timeouts.call = Duration::from_secs(2);
        let gateway = ConnectionGateway::new(&config);

        let response = call(&gateway, "bridge.call", json!({"endpoint": "/api/file-tree"})).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, codes::TIMEOUT);
        assert_eq!(error.data, Some(json!({"timeoutMs": 2000})));
    }

    #[tokio::test]
    async fn test_accept_registers_call_before_waiting() {
        let gateway = gateway();
        let line = request(3, "bridge.call", json!({"endpoint": "/api/file-tree"}));
        let accepted = accept(&gateway, &line);
        assert!(matches!(accepted, Accepted::Waiting { .. }));
        assert_eq!(gateway.correlator().pending_count(), 1);

        gateway.correlator().disconnect_all();
        let response = accepted.finish().await.unwrap();
        assert_eq!(response.id, json!(3));
        assert_eq!(response.error.unwrap().code, codes::RESOURCE_UNAVAILABLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eof_right_after_call_flushes_it() {
        let gateway = gateway();
        let input = format!("{}\n", request(4, "bridge.call", json!({"endpoint": "/api/file-tree"})));
        let (server_out, mut client_out) = tokio::io::duplex(4096);

        let started = tokio::time::Instant::now();
        serve(Arc::clone(&gateway), std::io::Cursor::new(input.into_bytes()), server_out)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        let mut output = String::new();
        client_out.read_to_string(&mut output).await.unwrap();
        let response: Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(response["id"], json!(4));
        assert_eq!(response["error"]["code"], json!(codes::RESOURCE_UNAVAILABLE));
        assert_eq!(gateway.correlator().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_serve_until_eof() {
        let gateway = gateway();
        let (mut client_in, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, mut client_out) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(serve(Arc::clone(&gateway), server_in, server_out));

        let input = [
            request(1, "locks.acquire", json!({"key": "k", "agentId": "a"})),
            String::new(),
            "garbage".to_string(),
            request(2, "activity.list", Value::Null),
        ]
        .join("\n");
        client_in.write_all(input.as_bytes()).await.unwrap();
        client_in.write_all(b"\n").await.unwrap();
        drop(client_in);

        let mut output = String::new();
        client_out.read_to_string(&mut output).await.unwrap();
        tokio_test::assert_ok!(server.await.unwrap());

        let mut responses: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        responses.sort_by_key(|r| r["id"].as_u64().unwrap_or(0));
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["error"]["code"], json!(codes::PARSE_ERROR));
        assert_eq!(responses[1]["result"]["acquired"], json!(true));
        assert_eq!(responses[2]["result"], json!([]));
        assert!(responses.iter().all(|r| r["jsonrpc"] == json!("2.0")));

        // EOF ends the caller session.
        assert_eq!(gateway.caller_phase(), sb_gateway::Phase::Offline);
    }

    #[tokio::test]
    async fn test_eof_flushes_pending_calls() {
        let gateway = gateway();
        let (mut client_in, server_in) = tokio::io::duplex(4096);
        let (server_out, mut client_out) = tokio::io::duplex(4096);
        let server = tokio::spawn(serve(Arc::clone(&gateway), server_in, server_out));

        let line = request(9, "bridge.call", json!({"endpoint": "/api/file-tree"}));
        client_in.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        while gateway.correlator().pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        drop(client_in);

        let mut output = String::new();
        client_out.read_to_string(&mut output).await.unwrap();
        server.await.unwrap().unwrap();

        let response: Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(response["id"], json!(9));
        assert_eq!(response["error"]["code"], json!(codes::RESOURCE_UNAVAILABLE));
    }
}
