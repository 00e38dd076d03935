//! Core Wasmtime sandbox for wasmgate.
//!
//! This crate provides the per-request execution pipeline:
//! - [`WasmEngine`]: Configured Wasmtime engine shared across requests
//! - [`GuestContext`]: Per-invocation state visible to host functions
//! - [`SandboxFactory`]: Builds and runs one isolated sandbox per request
//! - [`HostBridge`]: Seam through which host functions are registered
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     WasmEngine                          │
//! │  (Shared across all requests, thread-safe, stateless)   │
//! └─────────────────────────────────────────────────────────┘
//!                            │ one invoke() per request
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │       Store<GuestContext> + Linker + Instance           │
//! │  (Created fresh, destroyed at the end of the request)   │
//! │  - WASI env vars + captured stdout                      │
//! │  - Host function bridge                                 │
//! │  - Fuel metering + epoch deadline                       │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod context;
pub mod engine;
pub mod sandbox;

pub use context::{ExecutionMetrics, GuestContext, GuestLog};
pub use engine::WasmEngine;
pub use sandbox::{HostBridge, InvocationOutput, SandboxFactory};
