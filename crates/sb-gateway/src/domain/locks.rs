//! TTL lock registry.
//!
//! Lets independent agents claim a resource key before editing it. There is
//! no background expiry: expired entries are dropped at the start of every
//! operation, so an observer never sees two live holders for one key.

use crate::domain::error::LockError;
use crate::ports::{TimeSource, Timestamp};
use parking_lot::Mutex;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    pub key: String,
    pub holder: String,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl LockEntry {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// Result of [`LockRegistry::acquire`]. On conflict `holder`/`expires_at`
/// describe the current owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockGrant {
    pub acquired: bool,
    pub holder: String,
    pub expires_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    Refused(LockError),
}

impl ReleaseOutcome {
    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released)
    }
}

/// `{"released": true}` or `{"released": false, "error": "..."}`
impl Serialize for ReleaseOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Released => {
                let mut state = serializer.serialize_struct("ReleaseOutcome", 1)?;
                state.serialize_field("released", &true)?;
                state.end()
            }
            Self::Refused(err) => {
                let mut state = serializer.serialize_struct("ReleaseOutcome", 2)?;
                state.serialize_field("released", &false)?;
                state.serialize_field("error", &err.to_string())?;
                state.end()
            }
        }
    }
}

pub struct LockRegistry {
    entries: Mutex<HashMap<String, LockEntry>>,
    default_ttl: Duration,
    clock: Arc<dyn TimeSource>,
}

impl LockRegistry {
    pub fn new(default_ttl: Duration, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            clock,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Claim or renew `key` for `holder`.
    ///
    /// Renewal by the current holder always succeeds and always moves the
    /// expiry forward. A live lock held by someone else is reported back
    /// untouched.
    pub fn acquire(&self, key: &str, holder: &str, ttl: Option<Duration>) -> LockGrant {
        let now = self.clock.now();
        let ttl_ms = u64::try_from(ttl.unwrap_or(self.default_ttl).as_millis()).unwrap_or(u64::MAX);
        let mut entries = self.entries.lock();
        sweep_expired(&mut entries, now);

        match entries.get_mut(key) {
            Some(entry) if entry.holder != holder => {
                debug!(key, holder, current = %entry.holder, "Lock conflict");
                LockGrant {
                    acquired: false,
                    holder: entry.holder.clone(),
                    expires_at: entry.expires_at,
                }
            }
            Some(entry) => {
                entry.expires_at = now.saturating_add(ttl_ms).max(entry.expires_at.saturating_add(1));
                debug!(key, holder, expires_at = entry.expires_at, "Lock renewed");
                LockGrant {
                    acquired: true,
                    holder: entry.holder.clone(),
                    expires_at: entry.expires_at,
                }
            }
            None => {
                let entry = LockEntry {
                    key: key.to_string(),
                    holder: holder.to_string(),
                    acquired_at: now,
                    expires_at: now.saturating_add(ttl_ms),
                };
                let grant = LockGrant {
                    acquired: true,
                    holder: entry.holder.clone(),
                    expires_at: entry.expires_at,
                };
                debug!(key, holder, expires_at = entry.expires_at, "Lock acquired");
                entries.insert(key.to_string(), entry);
                grant
            }
        }
    }

    /// Only the current holder can release.
    pub fn release(&self, key: &str, holder: &str) -> ReleaseOutcome {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        sweep_expired(&mut entries, now);

        match entries.get(key) {
            None => ReleaseOutcome::Refused(LockError::NotFound {
                key: key.to_string(),
            }),
            Some(entry) if entry.holder != holder => ReleaseOutcome::Refused(LockError::NotHolder {
                key: key.to_string(),
                holder: entry.holder.clone(),
                requester: holder.to_string(),
            }),
            Some(_) => {
                entries.remove(key);
                debug!(key, holder, "Lock released");
                ReleaseOutcome::Released
            }
        }
    }

    /// Live entries, oldest acquisition first.
    pub fn list(&self) -> Vec<LockEntry> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        sweep_expired(&mut entries, now);

        let mut live: Vec<LockEntry> = entries.values().cloned().collect();
        live.sort_by(|a, b| (a.acquired_at, &a.key).cmp(&(b.acquired_at, &b.key)));
        live
    }
}

fn sweep_expired(entries: &mut HashMap<String, LockEntry>, now: Timestamp) {
    entries.retain(|_, entry| !entry.is_expired(now));
}
