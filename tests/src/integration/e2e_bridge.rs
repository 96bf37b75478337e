//! # End-to-End Bridge Flows
//!
//! The caller submits through the gateway, the real `PollingClient` polls
//! it over HTTP, executes the call with its `RouteTable` and posts the
//! result back.
//!
//! ## Flow Tested:
//!
//! 1. **Caller → Gateway → Host → Gateway → Caller**: results and errors
//! 2. **Host restart**: `deactivate` flushes, `activate` starts a new session
//! 3. **Stdio front**: JSON-RPC lines in, results out, with a live host

#[cfg(test)]
mod tests {
    use super::super::{fast_poll_config, wait_until, TestBridge};
    use bridge_runtime::stdio;
    use sb_gateway::CallError;
    use sb_host_client::{ConnectionStatus, HostEndpoint, PollingClient, RouteTable, RouterError};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// A small host: a selection, a script store and a failing delete.
    fn studio_routes(executions: Arc<AtomicUsize>) -> RouteTable {
        RouteTable::new()
            .route(HostEndpoint::GetSelection, move |_| {
                let executions = Arc::clone(&executions);
                async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(["game.Workspace.Baseplate"]))
                }
            })
            .route(HostEndpoint::GetScriptSource, |data: Value| async move {
                let path = data["instancePath"].as_str().unwrap_or_default().to_string();
                Ok(json!({"instancePath": path, "source": "print('hi')"}))
            })
            .route(HostEndpoint::DeleteObject, |data: Value| async move {
                Err(RouterError::Procedure(format!(
                    "Instance not found: {}",
                    data["instancePath"].as_str().unwrap_or_default()
                )))
            })
    }

    async fn host(bridge: &TestBridge, executions: Arc<AtomicUsize>) -> PollingClient {
        let client = PollingClient::new(fast_poll_config(&bridge.url), Arc::new(studio_routes(executions)))
            .unwrap();
        client.activate().await;
        client
    }

    async fn within<F: std::future::Future>(future: F) -> F::Output {
        tokio::time::timeout(Duration::from_secs(5), future)
            .await
            .expect("settled within 5s")
    }

    // =============================================================================
    // CALLER ⇄ HOST
    // =============================================================================

    #[tokio::test]
    async fn test_call_executes_exactly_once() {
        let bridge = TestBridge::start().await;
        let gateway = bridge.gateway();
        gateway.activate_caller();
        let executions = Arc::new(AtomicUsize::new(0));
        let client = host(&bridge, Arc::clone(&executions)).await;

        let result = within(gateway.submit("/api/get-selection", json!({}))).await;
        assert_eq!(result.unwrap(), json!(["game.Workspace.Baseplate"]));
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(client.status(), ConnectionStatus::Connected);
        assert!(client.caller_connected());

        client.deactivate().await;
        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_concurrent_calls_settle_independently() {
        let bridge = TestBridge::start().await;
        let gateway = bridge.gateway();
        gateway.activate_caller();
        let client = host(&bridge, Arc::new(AtomicUsize::new(0))).await;

        let handles: Vec<_> = (0..5)
            .map(|i| {
                gateway.submit(
                    "/api/get-script-source",
                    json!({"instancePath": format!("game.Script{i}")}),
                )
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let result = within(handle).await.unwrap();
            assert_eq!(result["instancePath"], json!(format!("game.Script{i}")));
        }
        assert_eq!(gateway.correlator().stats().completed, 5);

        client.deactivate().await;
        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_procedure_and_routing_errors_reach_caller() {
        let bridge = TestBridge::start().await;
        let gateway = bridge.gateway();
        gateway.activate_caller();
        let client = host(&bridge, Arc::new(AtomicUsize::new(0))).await;

        let failed = within(gateway.submit("/api/delete-object", json!({"instancePath": "game.Nope"}))).await;
        assert_eq!(
            failed,
            Err(CallError::Remote(json!("Instance not found: game.Nope")))
        );

        let unknown = within(gateway.submit("/api/format-disk", Value::Null)).await;
        assert_eq!(
            unknown,
            Err(CallError::Remote(json!("Unknown endpoint: /api/format-disk")))
        );

        client.deactivate().await;
        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_host_waits_for_caller() {
        let bridge = TestBridge::start().await;
        let gateway = bridge.gateway();
        let executions = Arc::new(AtomicUsize::new(0));
        let client = host(&bridge, Arc::clone(&executions)).await;

        // Submitted while the caller is inactive: polls get 503 and nothing runs.
        let handle = gateway.submit("/api/get-selection", Value::Null);
        wait_until(|| !client.caller_connected() && client.status() == ConnectionStatus::Connected).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(executions.load(Ordering::SeqCst), 0);

        gateway.activate_caller();
        assert!(within(handle).await.is_ok());
        assert_eq!(executions.load(Ordering::SeqCst), 1);

        client.deactivate().await;
        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_host_restart_flushes_old_session() {
        let bridge = TestBridge::start().await;
        let gateway = bridge.gateway();
        gateway.activate_caller();
        let client = host(&bridge, Arc::new(AtomicUsize::new(0))).await;
        client.deactivate().await;
        assert_eq!(client.status(), ConnectionStatus::Disconnected);

        let stranded = gateway.submit("/api/get-selection", Value::Null);
        client.activate().await;
        // `ready` on reactivation ends the old session.
        assert_eq!(within(stranded).await, Err(CallError::ConnectionClosed));

        let fresh = within(gateway.submit("/api/get-selection", Value::Null)).await;
        assert!(fresh.is_ok());

        client.deactivate().await;
        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_unreachable_gateway_then_recovery() {
        let bridge = TestBridge::start().await;
        let url = bridge.url.clone();
        let addr: std::net::SocketAddr = url.trim_start_matches("http://").parse().unwrap();
        bridge.stop().await;

        let client = PollingClient::new(fast_poll_config(&url), Arc::new(RouteTable::new())).unwrap();
        client.activate().await;
        wait_until(|| client.poll_state().consecutive_failures() >= 3).await;
        assert_eq!(client.status(), ConnectionStatus::Connecting);

        let mut config = super::super::local_config();
        config.server.port = addr.port();
        let restarted = TestBridge::start_with(config).await;
        wait_until(|| client.status() == ConnectionStatus::Connected).await;
        assert_eq!(client.poll_state().consecutive_failures(), 0);

        client.deactivate().await;
        restarted.stop().await;
    }

    // =============================================================================
    // STDIO FRONT
    // =============================================================================

    #[tokio::test]
    async fn test_stdio_front_with_live_host() {
        let bridge = TestBridge::start().await;
        let gateway = bridge.gateway();
        let client = host(&bridge, Arc::new(AtomicUsize::new(0))).await;

        let (mut tool_in, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, mut tool_out) = tokio::io::duplex(64 * 1024);
        let front = tokio::spawn(stdio::serve(Arc::clone(&gateway), server_in, server_out));

        let lines = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "bridge.call",
                   "params": {"endpoint": "/api/get-selection", "data": {}}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "locks.acquire",
                   "params": {"key": "game.Workspace", "agentId": "agent-1"}}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "bridge.call",
                   "params": {"endpoint": "/api/delete-object", "data": {"instancePath": "game.X"}}}),
        ];
        for line in &lines {
            tool_in.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        }

        // Two bridge.call results have to come back before the input closes.
        let stats = Arc::clone(&gateway);
        wait_until(move || {
            let s = stats.correlator().stats();
            s.completed + s.failed == 2
        })
        .await;
        drop(tool_in);

        let mut output = String::new();
        within(tool_out.read_to_string(&mut output)).await.unwrap();
        front.await.unwrap().unwrap();

        let mut responses: Vec<Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        responses.sort_by_key(|r| r["id"].as_u64());
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"], json!(["game.Workspace.Baseplate"]));
        assert_eq!(responses[1]["result"]["acquired"], json!(true));
        assert_eq!(responses[2]["error"]["code"], json!(-32603));
        assert_eq!(responses[2]["error"]["message"], json!("Instance not found: game.X"));

        client.deactivate().await;
        bridge.stop().await;
    }
}
