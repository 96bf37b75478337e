//! Polling Client - the host side of the bridge.
//!
//! A heartbeat ticks every [`HEARTBEAT_TICK`]; whenever the effective poll
//! interval has elapsed it starts one `/poll`, unless one is still
//! outstanding. A delivered call runs on its own task so a slow procedure
//! never delays the next poll, and its outcome is posted to `/response`.

use crate::config::PollConfig;
use crate::error::TransportError;
use crate::router::ProcedureRouter;
use crate::state::{BackoffPolicy, ClientPollState, ConnectionStatus};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use shared_wire::{CallId, PollResponse, PolledRequest, ReadySignal, ResponseEnvelope};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Scheduler resolution
pub const HEARTBEAT_TICK: Duration = Duration::from_millis(50);

/// Settled call ids remembered to ignore late re-deliveries.
const RECENT_CALLS: usize = 256;

/// Result of one poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another poll is outstanding, or the client is inactive
    Skipped,
    /// The gateway answered; carries the call dispatched, if any
    Reachable { dispatched: Option<CallId> },
    /// Transport failure, counted toward backoff
    Failed,
}

/// Calls currently executing or recently settled on this host.
///
/// `/poll` keeps surfacing the oldest call until its response lands, so the
/// same id can arrive several times.
#[derive(Debug, Default)]
struct DeliveryGuard {
    executing: HashSet<CallId>,
    recent: VecDeque<CallId>,
}

impl DeliveryGuard {
    fn claim(&mut self, id: CallId) -> bool {
        if self.recent.contains(&id) {
            return false;
        }
        self.executing.insert(id)
    }

    /// Undelivered results are forgotten so the call can run again when the
    /// gateway re-offers it.
    fn finish(&mut self, id: CallId, delivered: bool) {
        self.executing.remove(&id);
        if !delivered {
            return;
        }
        self.recent.push_back(id);
        while self.recent.len() > RECENT_CALLS {
            self.recent.pop_front();
        }
    }
}

struct Shared {
    http: Client,
    config: PollConfig,
    router: Arc<dyn ProcedureRouter>,
    state: Mutex<ClientPollState>,
    deliveries: Mutex<DeliveryGuard>,
}

/// Releases the poll slot when the poll finishes, however it finishes.
struct InFlight {
    shared: Arc<Shared>,
}

impl InFlight {
    fn acquire(shared: &Arc<Shared>) -> Option<Self> {
        if shared.state.lock().try_begin_poll() {
            Some(Self {
                shared: Arc::clone(shared),
            })
        } else {
            None
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.shared.state.lock().end_poll();
    }
}

pub struct PollingClient {
    shared: Arc<Shared>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl PollingClient {
    pub fn new(config: PollConfig, router: Arc<dyn ProcedureRouter>) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout.min(Duration::from_secs(2)))
            .build()?;

        let state = ClientPollState::new(BackoffPolicy::from(&config));
        Ok(Self {
            shared: Arc::new(Shared {
                http,
                config,
                router,
                state: Mutex::new(state),
                deliveries: Mutex::new(DeliveryGuard::default()),
            }),
            heartbeat: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PollConfig {
        &self.shared.config
    }

    /// Announce the host and start polling. Best effort: a gateway that is
    /// not up yet is found by the poll loop.
    pub async fn activate(&self) {
        self.shared.state.lock().reset(true);

        let url = self.shared.config.url("/ready");
        match self.shared.http.post(&url).json(&ReadySignal::now()).send().await {
            Ok(resp) => debug!(status = resp.status().as_u16(), "Sent ready signal"),
            Err(e) => warn!(error = %e, url = %url, "Ready signal failed"),
        }

        let mut heartbeat = self.heartbeat.lock();
        if heartbeat.is_none() {
            *heartbeat = Some(tokio::spawn(heartbeat_loop(Arc::clone(&self.shared))));
        }
        info!(server = %self.shared.config.server_url, "Polling client activated");
    }

    /// Stop polling and tell the gateway. Best effort.
    pub async fn deactivate(&self) {
        self.shared.state.lock().reset(false);
        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }

        let url = self.shared.config.url("/disconnect");
        if let Err(e) = self.shared.http.post(&url).json(&serde_json::json!({})).send().await {
            warn!(error = %e, url = %url, "Disconnect signal failed");
        }
        info!("Polling client deactivated");
    }

    /// Run one poll now, honoring the single in-flight rule.
    pub async fn poll_once(&self) -> PollOutcome {
        match InFlight::acquire(&self.shared) {
            Some(slot) => poll_with_slot(slot).await,
            None => PollOutcome::Skipped,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status()
    }

    /// Whether the last reachable poll reported the caller side online
    pub fn caller_connected(&self) -> bool {
        self.shared.state.lock().caller_connected()
    }

    pub fn poll_state(&self) -> ClientPollState {
        self.shared.state.lock().clone()
    }

    pub fn executing_calls(&self) -> usize {
        self.shared.deliveries.lock().executing.len()
    }
}

impl Drop for PollingClient {
    fn drop(&mut self) {
        if let Some(handle) = self.heartbeat.get_mut().take() {
            handle.abort();
        }
    }
}

async fn heartbeat_loop(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(HEARTBEAT_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_poll: Option<Instant> = None;

    loop {
        ticker.tick().await;
        let interval = shared.state.lock().effective_interval();
        let due = last_poll.map_or(true, |at| at.elapsed() >= interval);
        if !due {
            continue;
        }
        last_poll = Some(Instant::now());
        if let Some(slot) = InFlight::acquire(&shared) {
            tokio::spawn(poll_with_slot(slot));
        }
    }
}

async fn poll_with_slot(slot: InFlight) -> PollOutcome {
    let shared = Arc::clone(&slot.shared);
    let result = fetch_poll(&shared).await;
    drop(slot);

    match result {
        Ok(response) => {
            let active = {
                let mut state = shared.state.lock();
                state.record_reachable(response.mcp_connected);
                state.is_active()
            };
            // Deactivated while the poll was in flight: drop the call.
            let dispatched = if active && response.mcp_connected {
                response
                    .delivered_call()
                    .and_then(|(id, request)| dispatch(&shared, id, request.clone()))
            } else {
                None
            };
            PollOutcome::Reachable { dispatched }
        }
        Err(e) => {
            let failures = {
                let mut state = shared.state.lock();
                state.record_failure();
                state.consecutive_failures()
            };
            debug!(error = %e, failures, "Poll failed");
            if failures == shared.config.max_failures_before_error {
                warn!(failures, server = %shared.config.server_url, "Gateway unreachable");
            }
            PollOutcome::Failed
        }
    }
}

async fn fetch_poll(shared: &Shared) -> Result<PollResponse, TransportError> {
    let response = shared.http.get(shared.config.url("/poll")).send().await?;
    let status = response.status();
    if status != StatusCode::OK && status != StatusCode::SERVICE_UNAVAILABLE {
        return Err(TransportError::UnexpectedStatus(status.as_u16()));
    }
    response
        .json::<PollResponse>()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))
}

/// Spawns the call unless this host is already running it.
fn dispatch(shared: &Arc<Shared>, id: CallId, request: PolledRequest) -> Option<CallId> {
    if !shared.deliveries.lock().claim(id) {
        debug!(call_id = %id, "Call already executing, skipping re-delivery");
        return None;
    }

    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        debug!(call_id = %id, endpoint = %request.endpoint, "Executing call");
        let envelope = execute(&shared, id, request).await;
        let delivered = post_response(&shared, &envelope).await;
        shared.deliveries.lock().finish(id, delivered);
    });
    Some(id)
}

async fn execute(shared: &Arc<Shared>, id: CallId, request: PolledRequest) -> ResponseEnvelope {
    let router = Arc::clone(&shared.router);
    let PolledRequest { endpoint, data } = request;

    // Own task so a panicking procedure cannot take the poll loop with it.
    let task = tokio::spawn(async move { router.dispatch(&endpoint, data).await });
    match task.await {
        Ok(Ok(value)) => ResponseEnvelope::success(id, value),
        Ok(Err(e)) => ResponseEnvelope::failure(id, e.to_string()),
        Err(join) => {
            warn!(call_id = %id, error = %join, "Procedure panicked");
            ResponseEnvelope::failure(id, format!("procedure panicked: {join}"))
        }
    }
}

/// Posts the outcome, retrying once. `true` once the gateway accepted it.
async fn post_response(shared: &Shared, envelope: &ResponseEnvelope) -> bool {
    let url = shared.config.url("/response");
    for attempt in 1..=2 {
        match shared.http.post(&url).json(envelope).send().await {
            Ok(resp) if resp.status().is_success() => return true,
            Ok(resp) => warn!(
                request_id = %envelope.request_id,
                status = resp.status().as_u16(),
                attempt,
                "Gateway rejected response"
            ),
            Err(e) => warn!(
                request_id = %envelope.request_id,
                error = %e,
                attempt,
                "Failed to post response"
            ),
        }
    }
    false
}
