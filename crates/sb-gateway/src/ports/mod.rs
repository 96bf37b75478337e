//! Ports for the bridge gateway.

pub mod time;

pub use time::{ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
