//! # Shared Wire Crate
//!
//! JSON bodies of the short-poll bridge protocol.
//!
//! ## Endpoint Contract
//!
//! | Endpoint           | Request body          | Response body      |
//! |--------------------|-----------------------|--------------------|
//! | `GET /health`      | -                     | [`HealthSnapshot`] |
//! | `GET /status`      | -                     | [`StatusSnapshot`] |
//! | `POST /ready`      | [`ReadySignal`]       | [`Ack`]            |
//! | `POST /disconnect` | -                     | [`Ack`]            |
//! | `GET /poll`        | -                     | [`PollResponse`]   |
//! | `POST /response`   | [`ResponseEnvelope`]  | [`Ack`]            |
//!
//! Field names are camelCase on the wire; the host side of the bridge is not
//! written in Rust and expects them that way.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod duration_serde;
pub mod envelope;
pub mod ids;
pub mod poll;
pub mod status;

pub use envelope::{Ack, ReadySignal, ResponseEnvelope};
pub use ids::CallId;
pub use poll::{PollResponse, PolledRequest};
pub use status::{CallStats, HealthSnapshot, StatusSnapshot};
