//! Host-side polling client for the studio bridge.
//!
//! The host application cannot be called into, so it polls the gateway on a
//! fixed cadence, runs whatever call it is handed through a
//! [`ProcedureRouter`], and posts the outcome back.
//!
//! ```ignore
//! use sb_host_client::{HostEndpoint, PollConfig, PollingClient, RouteTable};
//!
//! let routes = RouteTable::new()
//!     .route(HostEndpoint::GetSelection, |_| async { Ok(json!([])) });
//! let client = PollingClient::new(PollConfig::default(), Arc::new(routes))?;
//! client.activate().await;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod router;
pub mod state;

pub use client::{PollOutcome, PollingClient, HEARTBEAT_TICK};
pub use config::PollConfig;
pub use error::{RouterError, TransportError};
pub use router::{HostEndpoint, ProcedureRouter, RouteTable};
pub use state::{BackoffPolicy, ClientPollState, ConnectionStatus};
