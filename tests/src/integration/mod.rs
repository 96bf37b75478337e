//! # Integration Fixtures
//!
//! A gateway bound to an ephemeral local port plus helpers for driving it.

pub mod e2e_bridge;
pub mod gateway_http;

use sb_gateway::{BridgeConfig, BridgeService, ConnectionGateway};
use sb_host_client::PollConfig;
use std::sync::Arc;
use std::time::Duration;

/// A running gateway on `127.0.0.1`.
pub struct TestBridge {
    pub service: BridgeService,
    pub url: String,
}

impl TestBridge {
    pub async fn start() -> Self {
        Self::start_with(local_config()).await
    }

    pub async fn start_with(config: BridgeConfig) -> Self {
        let mut service = BridgeService::new(config).expect("valid config");
        let addr = service.start().await.expect("bind ephemeral port");
        Self {
            service,
            url: format!("http://{addr}"),
        }
    }

    pub fn gateway(&self) -> Arc<ConnectionGateway> {
        Arc::clone(self.service.gateway())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }

    pub async fn stop(mut self) {
        self.service.shutdown().await;
    }
}

/// Default configuration bound to an ephemeral loopback port.
pub fn local_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.server.host = "127.0.0.1".parse().expect("loopback");
    config.server.port = 0;
    config
}

/// Host-side configuration with a short poll cadence.
pub fn fast_poll_config(url: &str) -> PollConfig {
    PollConfig {
        poll_interval: Duration::from_millis(20),
        initial_backoff: Duration::from_millis(20),
        request_timeout: Duration::from_secs(2),
        ..PollConfig::default()
    }
    .with_server_url(url)
}

/// Poll `check` every 10ms for up to 5s.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}
