//! wasmgate CLI entry point.
//!
//! Starts the HTTP gateway that runs WebAssembly modules as serverless
//! functions.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wasmgate_common::ConfigFile;
use wasmgate_server::GatewayServer;

#[derive(Parser)]
#[command(
    name = "wasmgate",
    version,
    about = "HTTP gateway that runs WebAssembly modules as serverless functions"
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "WASMGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides the config file), e.g. '0.0.0.0:8080'.
    #[arg(long, env = "BIND_ADDR")]
    bind_addr: Option<String>,

    /// Directory holding .wasm artifacts (overrides the config file).
    #[arg(long, env = "WASMGATE_MODULE_DIR")]
    module_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wasmgate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting wasmgate");

    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    if let Some(addr) = cli.bind_addr {
        config.server.bind_addr = addr;
    }
    if let Some(dir) = cli.module_dir {
        config.modules.dir = dir;
    }

    info!(
        bind_addr = %config.server.bind_addr,
        module_dir = %config.modules.dir,
        "Configuration loaded"
    );

    // Create and run server
    let server = GatewayServer::new(&config)?;

    info!("Server initialized. Available endpoints:");
    info!("  GET  /health          - Health check");
    info!("  ANY  /{{module-id}}     - Invoke a module, stdout becomes the response");

    server.run().await?;

    Ok(())
}
