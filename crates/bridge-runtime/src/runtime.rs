//! Process-level wiring: listeners, monitors and the stdio front.

use crate::monitor::{status_monitor, MONITOR_INTERVAL};
use crate::stdio;
use anyhow::{Context, Result};
use sb_gateway::{BridgeConfig, BridgeService, ConnectionGateway, Phase};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct BridgeRuntime {
    primary: BridgeService,
    /// Independent bridge on `legacy_port`, if configured and bound
    legacy: Option<BridgeService>,
    legacy_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeRuntime {
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let legacy_addr = config.legacy_addr();
        let legacy = match legacy_addr {
            Some(_) => Some(BridgeService::new(config.clone()).context("creating legacy bridge")?),
            None => None,
        };
        let primary = BridgeService::new(config).context("creating bridge")?;
        Ok(Self {
            primary,
            legacy,
            legacy_addr,
            tasks: Vec::new(),
        })
    }

    pub fn gateway(&self) -> &Arc<ConnectionGateway> {
        self.primary.gateway()
    }

    pub fn legacy_gateway(&self) -> Option<&Arc<ConnectionGateway>> {
        self.legacy.as_ref().map(BridgeService::gateway)
    }

    /// Bind the primary listener (fatal on failure) and the legacy one
    /// (logged and skipped on failure). Returns the primary address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = self.primary.start().await.context("starting bridge listener")?;
        info!(%addr, "Bridge listening for the host application");
        self.tasks.push(tokio::spawn(status_monitor(
            "primary",
            Arc::clone(self.primary.gateway()),
            MONITOR_INTERVAL,
        )));

        if let (Some(mut legacy), Some(legacy_addr)) = (self.legacy.take(), self.legacy_addr) {
            match legacy.start_on(legacy_addr).await {
                Ok(bound) => {
                    info!(addr = %bound, "Legacy bridge listening");
                    self.tasks.push(tokio::spawn(status_monitor(
                        "legacy",
                        Arc::clone(legacy.gateway()),
                        MONITOR_INTERVAL,
                    )));
                    self.tasks.push(tokio::spawn(mirror_caller(
                        Arc::clone(self.primary.gateway()),
                        Arc::clone(legacy.gateway()),
                        MONITOR_INTERVAL,
                    )));
                    self.legacy = Some(legacy);
                }
                Err(e) => warn!(addr = %legacy_addr, error = %e, "Legacy bridge not started"),
            }
        }
        Ok(addr)
    }

    /// Run the JSON-RPC front on the primary bridge until `reader` hits EOF.
    pub async fn serve_stdio<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        stdio::serve(Arc::clone(self.primary.gateway()), reader, writer).await
    }

    pub async fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(legacy) = self.legacy.as_mut() {
            legacy.shutdown().await;
        }
        self.primary.shutdown().await;
    }
}

/// Keep `target`'s caller machine in step with `source`'s.
///
/// The legacy bridge has no front of its own; it reports the caller as
/// present whenever the primary one does. The tick must stay below the
/// caller liveness window.
pub async fn mirror_caller(
    source: Arc<ConnectionGateway>,
    target: Arc<ConnectionGateway>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        mirror_once(&source, &target);
    }
}

fn mirror_once(source: &ConnectionGateway, target: &ConnectionGateway) {
    match source.caller_phase() {
        Phase::Online => {
            if !target.touch_caller() {
                target.activate_caller();
            }
        }
        Phase::Offline => {
            if target.caller_phase() == Phase::Online {
                target.deactivate_caller();
            }
        }
    }
}
