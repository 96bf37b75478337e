//! Bridge runtime entry point. See the library docs for the startup sequence.

use anyhow::Result;
use bridge_runtime::logging::init_logging;
use bridge_runtime::{BridgeRuntime, Cli};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;

    let config = cli.load_config()?;
    let mut runtime = BridgeRuntime::new(config)?;
    runtime.start().await?;

    if cli.no_stdio {
        info!("Stdio front disabled. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;
    } else {
        info!("Serving JSON-RPC on stdio, waiting for the host application to connect");
        tokio::select! {
            result = runtime.serve_stdio(tokio::io::stdin(), tokio::io::stdout()) => {
                if let Err(e) = result {
                    error!(error = %e, "Stdio front failed");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupted");
            }
        }
    }

    runtime.shutdown().await;
    Ok(())
}
