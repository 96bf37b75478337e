//! Liveness of one side of the bridge.
//!
//! "Alive" is never stored. It is recomputed from the last signal time on
//! every read, so two reads at the same instant always agree.

use crate::ports::Timestamp;
use std::fmt;
use std::time::Duration;

/// `now - last_signal_at < window`
pub fn is_alive(now: Timestamp, last_signal_at: Timestamp, window: Duration) -> bool {
    now.saturating_sub(last_signal_at) < window.as_millis() as u64
}

/// Observed phase of a liveness machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Offline,
    Online,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Offline => write!(f, "OFFLINE"),
            Phase::Online => write!(f, "ONLINE"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessState {
    last_signal_at: Option<Timestamp>,
    activated_at: Option<Timestamp>,
    explicitly_active: bool,
}

impl LivenessState {
    /// Explicit activation. Starts a new uptime period.
    pub fn activate(&mut self, now: Timestamp) {
        self.explicitly_active = true;
        self.activated_at = Some(now);
        self.last_signal_at = Some(now);
    }

    /// Any sign of life. Activates the machine if it was not active.
    pub fn signal(&mut self, now: Timestamp) {
        if !self.explicitly_active {
            self.activated_at = Some(now);
        }
        self.explicitly_active = true;
        self.last_signal_at = Some(now);
    }

    /// Refreshes the window only if the machine is already active.
    pub fn touch(&mut self, now: Timestamp) -> bool {
        if self.explicitly_active {
            self.last_signal_at = Some(now);
        }
        self.explicitly_active
    }

    pub fn deactivate(&mut self) {
        *self = Self::default();
    }

    pub fn is_alive(&self, now: Timestamp, window: Duration) -> bool {
        match self.last_signal_at {
            Some(last) => self.explicitly_active && is_alive(now, last, window),
            None => false,
        }
    }

    pub fn phase(&self, now: Timestamp, window: Duration) -> Phase {
        if self.is_alive(now, window) {
            Phase::Online
        } else {
            Phase::Offline
        }
    }

    pub fn is_explicitly_active(&self) -> bool {
        self.explicitly_active
    }

    pub fn last_signal_at(&self) -> Option<Timestamp> {
        self.last_signal_at
    }

    /// Milliseconds since activation, 0 when inactive.
    pub fn uptime(&self, now: Timestamp) -> u64 {
        match (self.explicitly_active, self.activated_at) {
            (true, Some(start)) => now.saturating_sub(start),
            _ => 0,
        }
    }
}
