//! Connection Gateway - the two liveness machines around the correlator.
//!
//! Transport-agnostic: `service.rs` maps HTTP requests onto these methods.
//!
//! Host machine: ONLINE on `ready` or any `poll`; OFFLINE on `disconnect`
//! or after `host_liveness` without a poll. Every way into OFFLINE, and
//! every `ready`, flushes the pending set.
//!
//! Caller machine: ONLINE on `activate_caller`, kept alive by
//! `touch_caller`, OFFLINE after `caller_liveness` without activity or on
//! `deactivate_caller`. Polls never refresh it.

use crate::domain::activity::ActivityLog;
use crate::domain::config::BridgeConfig;
use crate::domain::correlator::{PendingCallHandle, RequestCorrelator};
use crate::domain::error::CallError;
use crate::domain::liveness::{LivenessState, Phase};
use crate::domain::locks::LockRegistry;
use crate::ports::{SystemTimeSource, TimeSource, Timestamp};
use parking_lot::Mutex;
use serde_json::Value;
use shared_wire::{HealthSnapshot, PollResponse, ResponseEnvelope, StatusSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SERVICE_NAME: &str = "studio-bridge";

#[derive(Debug, Default)]
struct Links {
    host: LivenessState,
    caller: LivenessState,
    /// Host phase at the last observation, for OFFLINE transition detection
    host_was_alive: bool,
}

/// Answer to one `/poll`.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReply {
    /// `false` maps to 503
    pub caller_online: bool,
    pub body: PollResponse,
}

/// What one maintenance tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub swept: usize,
    pub flushed: usize,
    pub host_lost: bool,
}

pub struct ConnectionGateway {
    correlator: Arc<RequestCorrelator>,
    locks: LockRegistry,
    activity: ActivityLog,
    links: Mutex<Links>,
    clock: Arc<dyn TimeSource>,
    host_window: Duration,
    caller_window: Duration,
}

impl ConnectionGateway {
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemTimeSource))
    }

    pub fn with_clock(config: &BridgeConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            correlator: Arc::new(RequestCorrelator::new(config.timeouts.call)),
            locks: LockRegistry::new(config.locks.ttl, Arc::clone(&clock)),
            activity: ActivityLog::new(config.activity.capacity, Arc::clone(&clock)),
            links: Mutex::new(Links::default()),
            clock,
            host_window: config.timeouts.host_liveness,
            caller_window: config.timeouts.caller_liveness,
        }
    }

    pub fn correlator(&self) -> &Arc<RequestCorrelator> {
        &self.correlator
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Host-facing endpoints
    // ------------------------------------------------------------------

    /// Host (re)connected. A reconnect is a new session: nothing pending
    /// from the old one can still be answered.
    pub fn ready(&self) -> usize {
        let now = self.now();
        {
            let mut links = self.links.lock();
            links.host.activate(now);
            links.host_was_alive = true;
        }
        info!("Host signalled ready");
        self.correlator.disconnect_all()
    }

    pub fn disconnect(&self) -> usize {
        {
            let mut links = self.links.lock();
            links.host.deactivate();
            links.host_was_alive = false;
        }
        info!("Host signalled disconnect");
        self.correlator.disconnect_all()
    }

    /// Short poll. Never waits for work.
    pub fn poll(&self) -> PollReply {
        let now = self.now();
        let (host_lost, caller_online) = {
            let mut links = self.links.lock();
            let lost = self.observe_host(&mut links, now);
            links.host.signal(now);
            links.host_was_alive = true;
            (lost, links.caller.is_alive(now, self.caller_window))
        };
        if host_lost {
            self.correlator.disconnect_all();
        }

        if !caller_online {
            return PollReply {
                caller_online: false,
                body: PollResponse::caller_offline(),
            };
        }

        let body = match self.correlator.peek_oldest() {
            Some(call) => {
                debug!(call_id = %call.id, endpoint = %call.endpoint, "Delivering call to host");
                PollResponse::with_call(call.id, call.endpoint, call.payload)
            }
            None => PollResponse::idle(),
        };
        PollReply {
            caller_online: true,
            body,
        }
    }

    /// Settle a call from the host's answer. Unknown or malformed ids are
    /// ignored; returns whether a pending call was settled.
    pub fn respond(&self, envelope: ResponseEnvelope) -> bool {
        let Some(id) = envelope.call_id() else {
            warn!(request_id = %envelope.request_id, "Response with malformed call id");
            return false;
        };
        match envelope.into_outcome() {
            Ok(result) => self.correlator.complete(id, result),
            Err(error) => self.correlator.fail(id, CallError::Remote(error)),
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let now = self.now();
        let links = self.links.lock();
        StatusSnapshot {
            plugin_connected: links.host.is_alive(now, self.host_window),
            mcp_server_active: links.caller.is_alive(now, self.caller_window),
            last_mcp_activity: links.caller.last_signal_at(),
            uptime: links.caller.uptime(now),
            pending_calls: self.correlator.pending_count(),
            stats: self.correlator.stats(),
        }
    }

    pub fn health(&self) -> HealthSnapshot {
        let now = self.now();
        let links = self.links.lock();
        HealthSnapshot {
            status: "ok".to_string(),
            service: SERVICE_NAME.to_string(),
            plugin_connected: links.host.is_explicitly_active(),
            mcp_server_active: links.caller.is_alive(now, self.caller_window),
            uptime: links.caller.uptime(now),
        }
    }

    // ------------------------------------------------------------------
    // Caller side
    // ------------------------------------------------------------------

    pub fn activate_caller(&self) {
        self.links.lock().caller.activate(self.now());
        info!("Caller activated");
    }

    pub fn deactivate_caller(&self) {
        self.links.lock().caller.deactivate();
        info!("Caller deactivated");
    }

    /// Record caller activity. No effect unless the caller was activated.
    pub fn touch_caller(&self) -> bool {
        self.links.lock().caller.touch(self.now())
    }

    /// Queue a call for the host. Resolves when the host answers, the call
    /// times out, or the host session ends.
    pub fn submit(&self, endpoint: impl Into<String>, payload: Value) -> PendingCallHandle {
        self.correlator.submit(endpoint, payload)
    }

    pub fn host_phase(&self) -> Phase {
        self.links.lock().host.phase(self.now(), self.host_window)
    }

    pub fn caller_phase(&self) -> Phase {
        self.links.lock().caller.phase(self.now(), self.caller_window)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Stale-call sweep plus host timeout detection.
    pub fn maintain(&self) -> MaintenanceReport {
        let now = self.now();
        let host_lost = {
            let mut links = self.links.lock();
            self.observe_host(&mut links, now)
        };
        let flushed = if host_lost {
            self.correlator.disconnect_all()
        } else {
            0
        };
        MaintenanceReport {
            swept: self.correlator.sweep(),
            flushed,
            host_lost,
        }
    }

    /// Detects an ONLINE to OFFLINE transition of the host since the last
    /// observation.
    fn observe_host(&self, links: &mut Links, now: Timestamp) -> bool {
        if links.host_was_alive && !links.host.is_alive(now, self.host_window) {
            links.host_was_alive = false;
            warn!(
                window_ms = self.host_window.as_millis() as u64,
                "Host stopped polling, treating as disconnected"
            );
            return true;
        }
        false
    }
}

/// Periodic maintenance loop, runs until aborted.
pub async fn maintenance_task(gateway: Arc<ConnectionGateway>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let report = gateway.maintain();
        if report.swept > 0 || report.host_lost {
            debug!(
                swept = report.swept,
                flushed = report.flushed,
                host_lost = report.host_lost,
                "Maintenance tick"
            );
        }
    }
}
