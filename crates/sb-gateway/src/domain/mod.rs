//! Domain types for the bridge gateway.
//!
//! Everything here is transport-agnostic; `service.rs` is the only module
//! that knows about HTTP.

pub mod activity;
pub mod config;
pub mod correlator;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod liveness;
pub mod locks;

// Re-exports for convenience
pub use activity::{ActivityEntry, ActivityLog};
pub use config::{BridgeConfig, ConfigError};
pub use correlator::{PeekedCall, PendingCallHandle, RequestCorrelator};
pub use endpoints::GatewayEndpoint;
pub use error::{ApiError, ApiResult, CallError, GatewayError, LockError};
pub use gateway::{maintenance_task, ConnectionGateway, MaintenanceReport, PollReply};
pub use liveness::{LivenessState, Phase};
pub use locks::{LockEntry, LockGrant, LockRegistry, ReleaseOutcome};
