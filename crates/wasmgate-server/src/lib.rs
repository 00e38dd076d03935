//! HTTP request gateway for wasmgate.
//!
//! This crate provides the HTTP interface in front of the sandbox factory.
//! For each inbound request it:
//!
//! - extracts the module identifier from the first path segment
//! - builds the request-derived environment map
//! - resolves the identifier to a bytecode artifact on disk
//! - invokes the module in a fresh sandbox
//! - writes the captured output (or a diagnostic) as the response
//!
//! # Quick Start
//!
//! ```ignore
//! use wasmgate_common::ConfigFile;
//! use wasmgate_server::GatewayServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigFile::default();
//!     let server = GatewayServer::new(&config)?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod gateway;
pub mod resolver;
pub mod response;
pub mod router;
pub mod server;
pub mod state;

pub use resolver::ModuleResolver;
pub use server::{GatewayServer, ServerConfig};
pub use state::AppState;
