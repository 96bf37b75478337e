//! Polling client configuration.

use serde::{Deserialize, Serialize};
use shared_wire::duration_serde;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Gateway base URL, without trailing slash
    pub server_url: String,
    /// Poll cadence while healthy
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,
    /// Backoff floor, restored on every reachable poll
    #[serde(with = "duration_serde")]
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Backoff ceiling
    #[serde(with = "duration_serde")]
    pub max_backoff: Duration,
    /// Consecutive failures after which the backoff delay replaces the poll
    /// interval
    pub backoff_threshold: u32,
    /// Consecutive failures after which the status reads `Error`
    pub max_failures_before_error: u32,
    /// Per-request HTTP timeout
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3002".to_string(),
            poll_interval: Duration::from_millis(500),
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 1.2,
            max_backoff: Duration::from_secs(5),
            backoff_threshold: 5,
            max_failures_before_error: 50,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl PollConfig {
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }
}
