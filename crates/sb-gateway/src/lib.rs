//! Bridge gateway - caller side of the short-poll bridge.
//!
//! The host application cannot accept inbound connections, so every call the
//! caller makes is parked here until the host polls for it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          BRIDGE GATEWAY                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  caller (tool layer)                     host (polling client)       │
//! │        │                                         │                   │
//! │        │ submit()               GET /poll ───────┤                   │
//! │        ▼                        POST /response ──┤                   │
//! │  ┌─────────────────────┐        POST /ready ─────┤                   │
//! │  │  RequestCorrelator  │◄───┐   POST /disconnect ┘                   │
//! │  │ (oneshot per call)  │    │                                        │
//! │  └─────────────────────┘    │   ┌──────────────────────────┐         │
//! │                             └───┤    ConnectionGateway     │         │
//! │  ┌─────────────┐ ┌──────────┐   │  host / caller liveness  │         │
//! │  │ LockRegistry│ │Activity  │   └──────────────────────────┘         │
//! │  │   (TTL)     │ │Log (ring)│                                        │
//! │  └─────────────┘ └──────────┘                                        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - A submitted call settles exactly once: response, timeout, or flush.
//! - `/poll` never blocks and surfaces at most one call, oldest first.
//! - A host `ready`, `disconnect`, or liveness loss flushes every pending call.
//!
//! # Usage
//!
//! ```ignore
//! use sb_gateway::{BridgeConfig, BridgeService};
//!
//! let mut service = BridgeService::new(BridgeConfig::default())?;
//! service.start().await?;
//! service.gateway().activate_caller();
//! let result = service.gateway().submit("/api/file-tree", json!({})).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    ActivityEntry, ActivityLog, ApiError, ApiResult, BridgeConfig, CallError, ConfigError,
    ConnectionGateway, GatewayEndpoint, GatewayError, LockEntry, LockError, LockGrant,
    LockRegistry, Phase, ReleaseOutcome, RequestCorrelator,
};
pub use ports::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use service::{build_router, BridgeService};
