//! Host function registration for per-invocation linkers.
//!
//! Guest modules declare these functions as external imports; the linking
//! step resolves them against the bindings registered here, or fails the
//! invocation if it cannot.

use tracing::{info, warn};
use wasmtime::{Caller, Linker};

use wasmgate_common::GatewayError;
use wasmgate_core::{GuestContext, HostBridge};

/// The import namespace guest modules use for host functions.
const NAMESPACE: &str = "env";

/// The complete host-callable API: numeric and string logging.
///
/// Logged messages are emitted via `tracing` tagged with the invoking
/// module's identifier and accumulated on the invocation's [`GuestContext`].
pub struct LogBridge;

impl HostBridge for LogBridge {
    fn register(&self, linker: &mut Linker<GuestContext>) -> Result<(), GatewayError> {
        register_log_i32(linker)?;
        register_log_string(linker)?;
        Ok(())
    }
}

/// Register `env::log_i32(value: i32)`.
///
/// Records the integer to the process log, tagged with the module
/// identifier. No return value; cannot fail observably to the caller.
pub fn register_log_i32(linker: &mut Linker<GuestContext>) -> Result<(), GatewayError> {
    linker
        .func_wrap(
            NAMESPACE,
            "log_i32",
            |mut caller: Caller<'_, GuestContext>, value: i32| {
                let ctx = caller.data_mut();
                info!(module_id = %ctx.module_id(), guest_log = true, "{}", value);
                ctx.record_guest_log(value.to_string());
            },
        )
        .map_err(|e| {
            GatewayError::linkage_failed(format!("Failed to register log_i32: {e}"))
        })?;

    Ok(())
}

/// Register `env::log_string(ptr: i32, len: i32)`.
///
/// Reads `len` bytes at offset `ptr` from the guest's exported linear
/// memory and records them as a logged string tagged with the module
/// identifier.
///
/// An invalid range (negative values, overflow, out of bounds, missing
/// memory export) degrades to a host-side diagnostic; the guest receives
/// no error signal and keeps running.
pub fn register_log_string(linker: &mut Linker<GuestContext>) -> Result<(), GatewayError> {
    linker
        .func_wrap(
            NAMESPACE,
            "log_string",
            |mut caller: Caller<'_, GuestContext>, ptr: i32, len: i32| {
                // Validate pointer and length are non-negative
                if ptr < 0 || len < 0 {
                    warn!(
                        ptr = ptr,
                        len = len,
                        "log_string: invalid pointer or length (negative value)"
                    );
                    return;
                }

                let Some(memory) = caller
                    .get_export("memory")
                    .and_then(wasmtime::Extern::into_memory)
                else {
                    warn!("log_string: memory export not found in guest module");
                    return;
                };

                // Read the message out of guest memory and convert to an
                // owned String to avoid borrow conflicts with caller.data_mut()
                #[allow(clippy::cast_sign_loss)]
                let message = {
                    let data = memory.data(&caller);
                    let start = ptr as usize;
                    let Some(end) = start.checked_add(len as usize) else {
                        warn!(ptr = ptr, len = len, "log_string: pointer + length overflow");
                        return;
                    };

                    // Bounds check
                    if end > data.len() {
                        warn!(
                            start = start,
                            end = end,
                            memory_size = data.len(),
                            "log_string: memory access out of bounds"
                        );
                        return;
                    }

                    String::from_utf8_lossy(&data[start..end]).into_owned()
                };

                let ctx = caller.data_mut();
                info!(module_id = %ctx.module_id(), guest_log = true, "{}", message);
                ctx.record_guest_log(message);
            },
        )
        .map_err(|e| {
            GatewayError::linkage_failed(format!("Failed to register log_string: {e}"))
        })?;

    Ok(())
}
