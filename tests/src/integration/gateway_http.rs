//! # Gateway HTTP Contract
//!
//! Drives the gateway with plain HTTP requests, the way a host application
//! that does not use `sb-host-client` would.
//!
//! ## Flow Tested:
//!
//! 1. `/poll` answers 503 until the caller is active, then 200
//! 2. A submitted call is surfaced by `/poll` and settled by `/response`
//! 3. `/ready` and `/disconnect` flush pending calls
//! 4. Missing host polls flush pending calls after the liveness window

#[cfg(test)]
mod tests {
    use super::super::{local_config, TestBridge};
    use reqwest::StatusCode;
    use sb_gateway::CallError;
    use serde_json::{json, Value};
    use shared_wire::{PollResponse, ReadySignal};
    use std::time::Duration;

    async fn get(bridge: &TestBridge, path: &str) -> (StatusCode, Value) {
        let resp = reqwest::get(bridge.endpoint(path)).await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn post(bridge: &TestBridge, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = reqwest::Client::new()
            .post(bridge.endpoint(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    // =============================================================================
    // POLL CONTRACT
    // =============================================================================

    #[tokio::test]
    async fn test_poll_503_until_caller_active() {
        let bridge = TestBridge::start().await;

        let (status, body) = get(&bridge, "/poll").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], json!("MCP server not connected"));
        assert_eq!(body["mcpConnected"], json!(false));

        bridge.gateway().activate_caller();
        let (status, body) = get(&bridge, "/poll").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"request": null, "mcpConnected": true, "pluginConnected": true})
        );

        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_submit_poll_respond() {
        let bridge = TestBridge::start().await;
        let gateway = bridge.gateway();
        gateway.activate_caller();

        let first = gateway.submit("/api/get-script-source", json!({"instancePath": "game.A"}));
        let second = gateway.submit("/api/get-script-source", json!({"instancePath": "game.B"}));

        // Oldest first, and the same call until it is answered.
        let (_, body) = get(&bridge, "/poll").await;
        let polled: PollResponse = serde_json::from_value(body).unwrap();
        let (id, request) = polled.delivered_call().unwrap();
        assert_eq!(id, first.id());
        assert_eq!(request.data, json!({"instancePath": "game.A"}));
        let (_, again) = get(&bridge, "/poll").await;
        assert_eq!(again["requestId"], json!(first.id().to_string()));

        let (status, ack) = post(
            &bridge,
            "/response",
            json!({"requestId": first.id().to_string(), "response": {"source": "print(1)"}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"success": true}));
        assert_eq!(first.await.unwrap(), json!({"source": "print(1)"}));

        let (_, body) = get(&bridge, "/poll").await;
        assert_eq!(body["requestId"], json!(second.id().to_string()));
        post(
            &bridge,
            "/response",
            json!({"requestId": second.id().to_string(), "error": "Script not found"}),
        )
        .await;
        assert_eq!(
            second.await,
            Err(CallError::Remote(json!("Script not found")))
        );

        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_response_id_is_acknowledged() {
        let bridge = TestBridge::start().await;
        let (status, ack) = post(
            &bridge,
            "/response",
            json!({"requestId": "not-a-call", "response": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"success": true}));
        bridge.stop().await;
    }

    // =============================================================================
    // SESSION LIFECYCLE
    // =============================================================================

    #[tokio::test]
    async fn test_ready_flushes_previous_session() {
        let bridge = TestBridge::start().await;
        let gateway = bridge.gateway();
        let stale = gateway.submit("/api/file-tree", Value::Null);

        let (_, ack) = post(&bridge, "/ready", serde_json::to_value(ReadySignal::now()).unwrap()).await;
        assert_eq!(ack, json!({"success": true}));
        assert_eq!(stale.await, Err(CallError::ConnectionClosed));

        let (_, health) = get(&bridge, "/health").await;
        assert_eq!(health["status"], json!("ok"));
        assert_eq!(health["pluginConnected"], json!(true));

        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_disconnect_flushes_and_reports_offline() {
        let bridge = TestBridge::start().await;
        let gateway = bridge.gateway();
        gateway.activate_caller();
        post(&bridge, "/ready", json!({})).await;

        let pending = gateway.submit("/api/get-selection", Value::Null);
        let (_, status) = get(&bridge, "/status").await;
        assert_eq!(status["pluginConnected"], json!(true));
        assert_eq!(status["mcpServerActive"], json!(true));
        assert_eq!(status["pendingCalls"], json!(1));

        post(&bridge, "/disconnect", json!({})).await;
        assert_eq!(pending.await, Err(CallError::ConnectionClosed));

        let (_, status) = get(&bridge, "/status").await;
        assert_eq!(status["pluginConnected"], json!(false));
        assert_eq!(status["pendingCalls"], json!(0));
        assert_eq!(status["stats"]["flushed"], json!(1));

        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_host_silence_flushes_pending_calls() {
        let mut config = local_config();
        config.timeouts.host_liveness = Duration::from_millis(200);
        config.timeouts.sweep_interval = Duration::from_millis(50);
        let bridge = TestBridge::start_with(config).await;
        let gateway = bridge.gateway();
        gateway.activate_caller();
        post(&bridge, "/ready", json!({})).await;

        let pending = gateway.submit("/api/get-selection", Value::Null);
        let outcome = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("flushed by the maintenance tick");
        assert_eq!(outcome, Err(CallError::ConnectionClosed));

        let (_, status) = get(&bridge, "/status").await;
        assert_eq!(status["pluginConnected"], json!(false));
        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_call_timeout_over_http() {
        let mut config = local_config();
        config.timeouts.call = Duration::from_millis(150);
        let bridge = TestBridge::start_with(config).await;
        let gateway = bridge.gateway();
        gateway.activate_caller();

        let slow = gateway.submit("/api/execute-luau", json!({"code": "wait(60)"}));
        let id = slow.id();
        match slow.await {
            Err(CallError::Timeout { endpoint, after }) => {
                assert_eq!(endpoint, "/api/execute-luau");
                assert_eq!(after, Duration::from_millis(150));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        // The late answer is acknowledged and ignored.
        let (_, ack) = post(
            &bridge,
            "/response",
            json!({"requestId": id.to_string(), "response": "late"}),
        )
        .await;
        assert_eq!(ack, json!({"success": true}));
        let (_, body) = get(&bridge, "/poll").await;
        assert_eq!(body["request"], Value::Null);

        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let bridge = TestBridge::start().await;
        let (status, body) = get(&bridge, "/api/file-tree").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["path"], json!("/api/file-tree"));
        bridge.stop().await;
    }
}
