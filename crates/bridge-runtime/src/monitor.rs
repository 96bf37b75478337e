//! Periodic log line describing both ends of a bridge, emitted on change.

use sb_gateway::{ConnectionGateway, Phase};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSummary {
    BothConnected,
    HostOnly,
    CallerOnly,
    WaitingForBoth,
}

impl LinkSummary {
    pub fn from_phases(host: Phase, caller: Phase) -> Self {
        match (host, caller) {
            (Phase::Online, Phase::Online) => Self::BothConnected,
            (Phase::Online, Phase::Offline) => Self::HostOnly,
            (Phase::Offline, Phase::Online) => Self::CallerOnly,
            (Phase::Offline, Phase::Offline) => Self::WaitingForBoth,
        }
    }

    pub fn of(gateway: &ConnectionGateway) -> Self {
        Self::from_phases(gateway.host_phase(), gateway.caller_phase())
    }
}

impl fmt::Display for LinkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::BothConnected => "host and caller both connected",
            Self::HostOnly => "host connected but caller inactive",
            Self::CallerOnly => "caller active but waiting for host",
            Self::WaitingForBoth => "waiting for host and caller",
        };
        f.write_str(text)
    }
}

/// Remembers the last summary so only transitions are reported.
#[derive(Debug, Default)]
pub struct LinkWatch {
    last: Option<LinkSummary>,
}

impl LinkWatch {
    /// `Some` when the summary differs from the previous observation.
    pub fn observe(&mut self, summary: LinkSummary) -> Option<LinkSummary> {
        if self.last == Some(summary) {
            return None;
        }
        self.last = Some(summary);
        Some(summary)
    }
}

/// Runs until aborted.
pub async fn status_monitor(label: &'static str, gateway: Arc<ConnectionGateway>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut watch = LinkWatch::default();

    loop {
        ticker.tick().await;
        if let Some(summary) = watch.observe(LinkSummary::of(&gateway)) {
            info!(
                bridge = label,
                pending = gateway.correlator().pending_count(),
                "Bridge status: {summary}"
            );
        }
    }
}
