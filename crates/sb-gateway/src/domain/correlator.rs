//! Request Correlator - tracks in-flight bridge calls until the host answers.
//!
//! Flow:
//! 1. The caller submits `(endpoint, payload)` and awaits the returned handle
//! 2. `/poll` surfaces the oldest pending call to the host
//! 3. `/response` completes or fails it by id
//! 4. Otherwise its own timer, the periodic sweep, or a host disconnect
//!    settles it
//!
//! Every settlement path removes the entry from the map before sending on its
//! completion channel. Whichever path removes it first owns the outcome; the
//! others find nothing and return `false`.

use crate::domain::error::CallError;
use parking_lot::Mutex;
use serde_json::Value;
use shared_wire::{CallId, CallStats};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub type CallOutcome = Result<Value, CallError>;

/// A call waiting for the host
struct PendingCall {
    endpoint: String,
    payload: Value,
    created_at: Instant,
    /// Submission order, breaks `created_at` ties
    seq: u64,
    timeout: Duration,
    timer: Option<AbortHandle>,
    sink: oneshot::Sender<CallOutcome>,
}

/// Oldest pending call, as handed to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PeekedCall {
    pub id: CallId,
    pub endpoint: String,
    pub payload: Value,
}

/// How a call left the pending set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Completed,
    Failed,
    TimedOut,
    Flushed,
}

#[derive(Debug, Default)]
struct CorrelatorStats {
    registered: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    flushed: AtomicU64,
}

impl CorrelatorStats {
    fn record(&self, settlement: Settlement) {
        let counter = match settlement {
            Settlement::Completed => &self.completed,
            Settlement::Failed => &self.failed,
            Settlement::TimedOut => &self.timed_out,
            Settlement::Flushed => &self.flushed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CallStats {
        CallStats {
            registered: self.registered.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Inner {
    calls: HashMap<CallId, PendingCall>,
    next_seq: u64,
}

pub struct RequestCorrelator {
    inner: Mutex<Inner>,
    default_timeout: Duration,
    stats: CorrelatorStats,
}

impl RequestCorrelator {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            default_timeout,
            stats: CorrelatorStats::default(),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register a call with the default timeout.
    ///
    /// Must be called from within a tokio runtime: the per-call timer is a
    /// spawned task.
    pub fn submit(self: &Arc<Self>, endpoint: impl Into<String>, payload: Value) -> PendingCallHandle {
        self.submit_with_timeout(endpoint, payload, self.default_timeout)
    }

    pub fn submit_with_timeout(
        self: &Arc<Self>,
        endpoint: impl Into<String>,
        payload: Value,
        timeout: Duration,
    ) -> PendingCallHandle {
        let (id, rx) = self.insert(endpoint.into(), payload, timeout);

        // The timer only holds a weak reference so a dropped correlator
        // drops its pending senders, which resolves every handle.
        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(correlator) = weak.upgrade() {
                correlator.expire(id);
            }
        });

        match self.inner.lock().calls.get_mut(&id) {
            Some(call) => call.timer = Some(timer.abort_handle()),
            None => timer.abort(),
        }

        PendingCallHandle { id, rx }
    }

    fn insert(
        &self,
        endpoint: String,
        payload: Value,
        timeout: Duration,
    ) -> (CallId, oneshot::Receiver<CallOutcome>) {
        let id = CallId::new();
        let (sink, rx) = oneshot::channel();

        {
            let mut inner = self.inner.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            debug!(call_id = %id, endpoint = %endpoint, "Registered pending call");
            inner.calls.insert(
                id,
                PendingCall {
                    endpoint,
                    payload,
                    created_at: Instant::now(),
                    seq,
                    timeout,
                    timer: None,
                    sink,
                },
            );
        }

        self.stats.registered.fetch_add(1, Ordering::Relaxed);
        (id, rx)
    }

    /// The pending call with the smallest creation time, left in place.
    pub fn peek_oldest(&self) -> Option<PeekedCall> {
        let inner = self.inner.lock();
        inner
            .calls
            .iter()
            .min_by_key(|(_, call)| (call.created_at, call.seq))
            .map(|(id, call)| PeekedCall {
                id: *id,
                endpoint: call.endpoint.clone(),
                payload: call.payload.clone(),
            })
    }

    /// Resolve a call. Returns `false` if it was no longer pending.
    pub fn complete(&self, id: CallId, result: Value) -> bool {
        self.settle(id, Ok(result), Settlement::Completed)
    }

    /// Reject a call. Returns `false` if it was no longer pending.
    pub fn fail(&self, id: CallId, error: CallError) -> bool {
        let settlement = match &error {
            CallError::Timeout { .. } => Settlement::TimedOut,
            CallError::ConnectionClosed => Settlement::Flushed,
            CallError::Remote(_) => Settlement::Failed,
        };
        self.settle(id, Err(error), settlement)
    }

    fn settle(&self, id: CallId, outcome: CallOutcome, settlement: Settlement) -> bool {
        let Some(call) = self.take(id) else {
            warn!(call_id = %id, "Response for unknown or already settled call");
            return false;
        };
        debug!(
            call_id = %id,
            endpoint = %call.endpoint,
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "Settled pending call"
        );
        self.deliver(call, outcome, settlement);
        true
    }

    /// Per-call timer expiry.
    fn expire(&self, id: CallId) {
        if let Some(call) = self.take(id) {
            warn!(call_id = %id, endpoint = %call.endpoint, "Call timed out");
            let error = CallError::Timeout {
                endpoint: call.endpoint.clone(),
                after: call.timeout,
            };
            self.deliver(call, Err(error), Settlement::TimedOut);
        }
    }

    fn take(&self, id: CallId) -> Option<PendingCall> {
        self.inner.lock().calls.remove(&id)
    }

    /// Only ever called with an entry already removed from the map.
    fn deliver(&self, mut call: PendingCall, outcome: CallOutcome, settlement: Settlement) {
        if let Some(timer) = call.timer.take() {
            timer.abort();
        }
        self.stats.record(settlement);
        // Receiver gone means the caller stopped waiting; nothing to do.
        let _ = call.sink.send(outcome);
    }

    /// Fail every call older than its timeout. Safety net for missed timers.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<PendingCall> = {
            let mut inner = self.inner.lock();
            let ids: Vec<CallId> = inner
                .calls
                .iter()
                .filter(|(_, call)| now.saturating_duration_since(call.created_at) >= call.timeout)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| inner.calls.remove(id)).collect()
        };

        let count = expired.len();
        for call in expired {
            let error = CallError::Timeout {
                endpoint: call.endpoint.clone(),
                after: call.timeout,
            };
            self.deliver(call, Err(error), Settlement::TimedOut);
        }
        if count > 0 {
            warn!(swept = count, "Swept stale pending calls");
        }
        count
    }

    /// Fail every pending call with [`CallError::ConnectionClosed`].
    pub fn disconnect_all(&self) -> usize {
        let drained: Vec<PendingCall> = {
            let mut inner = self.inner.lock();
            inner.calls.drain().map(|(_, call)| call).collect()
        };

        let count = drained.len();
        for call in drained {
            self.deliver(call, Err(CallError::ConnectionClosed), Settlement::Flushed);
        }
        if count > 0 {
            info!(flushed = count, "Flushed pending calls on connection reset");
        }
        count
    }

    pub fn is_pending(&self, id: &CallId) -> bool {
        self.inner.lock().calls.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn stats(&self) -> CallStats {
        self.stats.snapshot()
    }
}

/// Awaitable result of a submitted call.
///
/// Resolves to [`CallError::ConnectionClosed`] if the correlator is dropped
/// with the call still pending.
#[derive(Debug)]
pub struct PendingCallHandle {
    id: CallId,
    rx: oneshot::Receiver<CallOutcome>,
}

impl PendingCallHandle {
    pub fn id(&self) -> CallId {
        self.id
    }
}

impl Future for PendingCallHandle {
    type Output = CallOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CallError::ConnectionClosed)))
    }
}
