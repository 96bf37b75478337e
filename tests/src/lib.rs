//! # Studio Bridge Test Suite
//!
//! Cross-crate tests. Every test binds a real gateway to `127.0.0.1:0` and
//! talks to it over HTTP, either raw (`reqwest`) or through the host-side
//! `PollingClient`.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── mod.rs           # Shared fixtures
//!     ├── gateway_http.rs  # Endpoint contract, driven with raw HTTP
//!     └── e2e_bridge.rs    # Caller ⇄ gateway ⇄ polling client
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sb-tests
//! cargo test -p sb-tests integration::e2e_bridge::
//! ```

#![allow(dead_code)]

pub mod integration;
