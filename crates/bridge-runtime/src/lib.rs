//! # Studio Bridge Runtime
//!
//! The caller-side process. It owns the gateway, serves the host-facing HTTP
//! endpoints and exposes the bridge to a tool process over stdin/stdout.
//!
//! ## Startup Sequence
//!
//! 1. Parse flags and environment, load the optional TOML file
//! 2. Initialize logging on stderr
//! 3. Bind the primary listener (and the legacy one, if configured)
//! 4. Start status monitors
//! 5. Serve JSON-RPC on stdin until EOF or Ctrl+C
//! 6. Shut the listeners down, flushing anything still pending
//!
//! ## Modules
//!
//! - `cli` - flags, environment and config file loading
//! - `logging` - subscriber setup
//! - `monitor` - periodic connection summary
//! - `runtime` - listener and task wiring
//! - `stdio` - line-delimited JSON-RPC front

pub mod cli;
pub mod logging;
pub mod monitor;
pub mod runtime;
pub mod stdio;

pub use cli::Cli;
pub use runtime::BridgeRuntime;
