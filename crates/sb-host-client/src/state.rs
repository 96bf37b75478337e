//! Poll loop bookkeeping: failures, backoff, in-flight guard.
//!
//! Pure state, no I/O. The client locks it around each transition.

use crate::config::PollConfig;
use std::fmt;
use std::time::Duration;

/// What the host shows for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Client not activated
    Disconnected,
    /// Too many consecutive failures
    Error,
    /// Last poll reached the gateway
    Connected,
    Connecting,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Error => write!(f, "error"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
        }
    }
}

/// Backoff knobs, copied out of [`PollConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub poll_interval: Duration,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    pub threshold: u32,
    pub max_failures_before_error: u32,
}

impl From<&PollConfig> for BackoffPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            initial_backoff: config.initial_backoff,
            multiplier: config.backoff_multiplier,
            max_backoff: config.max_backoff,
            threshold: config.backoff_threshold,
            max_failures_before_error: config.max_failures_before_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientPollState {
    policy: BackoffPolicy,
    active: bool,
    in_flight: bool,
    consecutive_failures: u32,
    backoff_delay: Duration,
    last_http_ok: bool,
    caller_connected: bool,
}

impl ClientPollState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            active: false,
            in_flight: false,
            consecutive_failures: 0,
            backoff_delay: policy.initial_backoff,
            last_http_ok: false,
            caller_connected: false,
        }
    }

    /// Back to a fresh, inactive-or-active connection with no history.
    /// A poll already in flight keeps its slot.
    pub fn reset(&mut self, active: bool) {
        *self = Self {
            in_flight: self.in_flight,
            active,
            ..Self::new(self.policy)
        };
    }

    /// Claims the single poll slot. `false` if a poll is outstanding or the
    /// client is inactive.
    pub fn try_begin_poll(&mut self) -> bool {
        if !self.active || self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn end_poll(&mut self) {
        self.in_flight = false;
    }

    /// 200 or 503: the gateway answered.
    pub fn record_reachable(&mut self, caller_connected: bool) {
        self.consecutive_failures = 0;
        self.backoff_delay = self.policy.initial_backoff;
        self.last_http_ok = true;
        self.caller_connected = caller_connected;
    }

    pub fn record_failure(&mut self) {
        if !self.active {
            return;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_http_ok = false;
        self.caller_connected = false;
        if self.consecutive_failures > 1 {
            let grown = (self.backoff_delay.as_nanos() as f64 * self.policy.multiplier).round();
            let grown = Duration::from_nanos(grown.min(u64::MAX as f64) as u64);
            self.backoff_delay = grown.min(self.policy.max_backoff);
        }
    }

    /// Delay between poll starts.
    pub fn effective_interval(&self) -> Duration {
        if self.consecutive_failures > self.policy.threshold {
            self.backoff_delay
        } else {
            self.policy.poll_interval
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        if !self.active {
            ConnectionStatus::Disconnected
        } else if self.consecutive_failures >= self.policy.max_failures_before_error {
            ConnectionStatus::Error
        } else if self.last_http_ok {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Connecting
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn backoff_delay(&self) -> Duration {
        self.backoff_delay
    }

    /// Caller side reported by the last reachable poll
    pub fn caller_connected(&self) -> bool {
        self.caller_connected
    }
}
