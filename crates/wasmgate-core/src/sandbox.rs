//! Per-request sandbox construction and execution.
//!
//! [`SandboxFactory::invoke`] drives the full lifecycle of one module
//! invocation:
//!
//! 1. *Created*: fresh store over a [`GuestContext`] with the request
//!    environment bound and stdout replaced by a capture pipe
//! 2. *Linked*: fresh linker with the WASI shim and the host bridge
//! 3. *Instantiated*: bytecode validated, compiled, imports resolved
//! 4. *Ran*: `_start` executed to completion
//! 5. *Terminated*: store, linker, and instance dropped unconditionally
//!
//! Nothing survives an invocation: bytecode, linear memory, host bindings,
//! and the output buffer are all scoped to a single `invoke` call.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument};
use wasmtime::{Linker, Module, Store, Trap};
use wasmtime_wasi::I32Exit;

use crate::context::{ExecutionMetrics, GuestContext, GuestLog};
use crate::engine::WasmEngine;
use wasmgate_common::{ExecutionConfig, GatewayError};

/// Entry point exported by guest modules (WASI command convention).
const ENTRY_POINT: &str = "_start";

/// Result of a fully successful invocation.
///
/// Failed invocations return a [`GatewayError`] instead; partial output
/// written before a fault is discarded with the sandbox.
#[derive(Debug)]
pub struct InvocationOutput {
    /// Captured standard output, decoded as text.
    pub stdout: String,

    /// Logs the guest emitted through the host bridge.
    pub guest_logs: Vec<GuestLog>,

    /// Execution metrics.
    pub metrics: ExecutionMetrics,
}

/// Host-side API registered into each sandbox before instantiation.
///
/// The factory stays independent of the concrete host functions; the
/// bridge implementation receives the fresh per-invocation linker and
/// registers its bindings under their import namespaces. Registration
/// failures abort the invocation as [`GatewayError::LinkageFailed`].
pub trait HostBridge: Send + Sync {
    /// Register all host bindings on the given linker.
    fn register(&self, linker: &mut Linker<GuestContext>) -> Result<(), GatewayError>;
}

/// Builds and runs one isolated sandbox per invocation.
///
/// The factory owns only shared, immutable pieces (engine, limits, bridge);
/// every call to [`invoke`](Self::invoke) constructs its own store, linker,
/// and instance, so concurrent invocations never observe each other's
/// state, even for the same module identifier.
pub struct SandboxFactory {
    engine: WasmEngine,
    config: ExecutionConfig,
    bridge: Arc<dyn HostBridge>,
}

impl SandboxFactory {
    /// Create a new sandbox factory.
    ///
    /// # Arguments
    ///
    /// * `engine` - Shared Wasmtime engine
    /// * `config` - Per-invocation execution limits
    /// * `bridge` - Host function bridge registered into every sandbox
    pub fn new(engine: WasmEngine, config: ExecutionConfig, bridge: Arc<dyn HostBridge>) -> Self {
        Self {
            engine,
            config,
            bridge,
        }
    }

    /// Run `bytecode` as module `module_id` with the given environment.
    ///
    /// On success returns the captured standard output together with guest
    /// logs and metrics. Any failure between linking and execution releases
    /// all sandbox resources and discards whatever the guest had already
    /// written to its output stream.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::LinkageFailed`] if host bindings cannot be registered
    /// - [`GatewayError::InvalidModule`] if the bytecode fails validation,
    ///   compilation, import resolution, or has no `_start` export
    /// - [`GatewayError::ExecutionFailed`] if the guest traps or exits
    ///   with a non-zero status
    /// - [`GatewayError::FuelExhausted`] / [`GatewayError::ExecutionTimeout`]
    ///   if a resource limit is hit
    #[instrument(skip(self, bytecode, env), fields(module_id = %module_id, bytes_len = bytecode.len()))]
    pub async fn invoke(
        &self,
        module_id: &str,
        bytecode: &[u8],
        env: &[(String, String)],
    ) -> Result<InvocationOutput, GatewayError> {
        let start = Instant::now();

        // Created: fresh store, environment bound, stdout replaced by the
        // capture pipe. The pipe handle outlives the store so the output
        // can be drained after execution.
        let (context, stdout) = GuestContext::new(module_id, env, self.config.max_output_bytes);
        let mut store = Store::new(self.engine.inner(), context);

        // The engine meters fuel unconditionally; an uncapped budget stands
        // in for "metering off".
        let fuel = if self.config.fuel_metering {
            self.config.max_fuel
        } else {
            u64::MAX
        };
        store
            .set_fuel(fuel)
            .map_err(|e| GatewayError::invalid_config(format!("Failed to set fuel: {e}")))?;

        // Deadline is measured in epoch ticks; the server's ticker advances
        // the epoch once per millisecond. Armed now so any code run during
        // instantiation is already bounded.
        if self.engine.config().epoch_interruption {
            store.set_epoch_deadline(self.config.timeout_ms);
        }

        // Linked: fresh linker with the system-call shim and the host bridge.
        let mut linker: Linker<GuestContext> = Linker::new(self.engine.inner());
        wasmtime_wasi::preview1::add_to_linker_async(&mut linker, |ctx: &mut GuestContext| {
            ctx.wasi_mut()
        })
        .map_err(|e| GatewayError::linkage_failed(format!("WASI registration failed: {e}")))?;
        self.bridge.register(&mut linker)?;

        debug!("Sandbox linked, loading module");

        // Instantiated: validate, compile, resolve imports.
        validate_wasm_header(bytecode)?;
        let module = Module::new(self.engine.inner(), bytecode)
            .map_err(|e| GatewayError::invalid_module(format!("compilation failed: {e}")))?;

        let instance = linker
            .instantiate_async(&mut store, &module)
            .await
            .map_err(|e| GatewayError::invalid_module(format!("instantiation failed: {e}")))?;

        let entry = instance
            .get_typed_func::<(), ()>(&mut store, ENTRY_POINT)
            .map_err(|_| {
                GatewayError::invalid_module(format!("entry point '{ENTRY_POINT}' not found"))
            })?;

        debug!("Module instantiated, executing entry point");

        // Re-arm the deadline so compilation time is not charged against
        // the guest's own budget.
        if self.engine.config().epoch_interruption {
            store.set_epoch_deadline(self.config.timeout_ms);
        }

        // Ran: execute to completion, failure, or limit.
        let initial_fuel = store.get_fuel().unwrap_or(0);
        let result = entry.call_async(&mut store, ()).await;

        let fuel_consumed = initial_fuel.saturating_sub(store.get_fuel().unwrap_or(0));
        store.data_mut().metrics.fuel_consumed = fuel_consumed;
        store.data_mut().finalize_metrics();

        let duration = start.elapsed();

        match result {
            Ok(()) => {}
            // WASI guests may finish via proc_exit; status zero is success.
            Err(trap) if trap.downcast_ref::<I32Exit>().is_some_and(|e| e.0 == 0) => {}
            Err(trap) => {
                // Terminated: the store (and with it the partial output)
                // drops on this early return.
                return Err(self.execution_error(trap, duration.as_millis() as u64, fuel_consumed));
            }
        }

        let context = store.into_data();
        let output = stdout.contents();

        info!(
            duration_ms = duration.as_millis(),
            fuel_consumed = fuel_consumed,
            output_bytes = output.len(),
            "Invocation completed"
        );

        Ok(InvocationOutput {
            stdout: String::from_utf8_lossy(&output).into_owned(),
            guest_logs: context.guest_logs,
            metrics: context.metrics,
        })
    }

    /// Map a failed entry-point call onto the error taxonomy.
    fn execution_error(
        &self,
        trap: wasmtime::Error,
        duration_ms: u64,
        fuel_consumed: u64,
    ) -> GatewayError {
        if let Some(exit) = trap.downcast_ref::<I32Exit>() {
            error!(
                duration_ms,
                exit_code = exit.0,
                "Guest exited with non-zero status"
            );
            return GatewayError::execution_failed(
                format!("module exited with status {}", exit.0),
                Some(exit.0.to_string()),
            );
        }

        if is_out_of_fuel(&trap) {
            error!(duration_ms, fuel_consumed, "Execution terminated: fuel exhausted");
            return GatewayError::FuelExhausted;
        }

        if is_epoch_interrupt(&trap) {
            error!(duration_ms, "Execution terminated: deadline exceeded");
            return GatewayError::ExecutionTimeout {
                duration_ms: self.config.timeout_ms,
            };
        }

        let (message, code) = extract_trap_info(&trap);
        error!(duration_ms, trap_message = %message, "Execution trapped");
        GatewayError::execution_failed(message, code)
    }

    /// Get the engine reference.
    pub fn engine(&self) -> &WasmEngine {
        &self.engine
    }

    /// Get the execution configuration.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }
}

impl std::fmt::Debug for SandboxFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Validate WebAssembly header (magic number).
fn validate_wasm_header(bytes: &[u8]) -> Result<(), GatewayError> {
    if bytes.len() < 8 {
        return Err(GatewayError::invalid_module("file too small"));
    }

    // Check magic number: \0asm
    if &bytes[0..4] != b"\0asm" {
        return Err(GatewayError::invalid_module("bad magic number"));
    }

    Ok(())
}

/// Extract human-readable trap information.
fn extract_trap_info(error: &wasmtime::Error) -> (String, Option<String>) {
    let message = error.to_string();

    // Try to get the trap code
    let code = error.downcast_ref::<Trap>().map(|trap| format!("{trap:?}"));

    (message, code)
}

/// Check if an error is due to fuel exhaustion.
fn is_out_of_fuel(error: &wasmtime::Error) -> bool {
    error
        .downcast_ref::<Trap>()
        .is_some_and(|trap| *trap == Trap::OutOfFuel)
}

/// Check if an error is due to the epoch deadline.
fn is_epoch_interrupt(error: &wasmtime::Error) -> bool {
    error
        .downcast_ref::<Trap>()
        .is_some_and(|trap| *trap == Trap::Interrupt)
}
