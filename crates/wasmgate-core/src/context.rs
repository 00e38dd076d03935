//! Per-invocation guest context.
//!
//! This module provides:
//! - [`GuestContext`]: Store data for one sandbox instance, accessible from
//!   host functions through the [`wasmtime::Caller`] API
//! - [`GuestLog`]: A log entry emitted by guest code through the host bridge
//! - [`ExecutionMetrics`]: Per-invocation performance metrics

use std::time::{Duration, Instant};

use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

/// Per-invocation execution context.
///
/// One `GuestContext` backs exactly one sandbox instance: it is created at
/// the start of an invocation and dropped with the store at the end of that
/// same invocation, whatever the outcome. It holds the WASI context (with
/// the request environment bound and stdout replaced by a capture pipe),
/// the module identifier used to tag guest logs, and the logs and metrics
/// accumulated while the guest runs.
pub struct GuestContext {
    /// WASI preview 1 context (environment variables, captured stdout).
    wasi: WasiP1Ctx,

    /// Identifier of the module being invoked, for log tagging.
    module_id: String,

    /// Logs emitted by the guest through the host bridge.
    pub guest_logs: Vec<GuestLog>,

    /// Execution metrics.
    pub metrics: ExecutionMetrics,

    /// Invocation start time.
    start_time: Instant,
}

/// A single log entry from guest code.
#[derive(Debug, Clone)]
pub struct GuestLog {
    /// Log message content.
    pub message: String,

    /// Timestamp when the log was recorded.
    pub timestamp: Instant,
}

/// Per-invocation performance metrics.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    /// Fuel consumed during execution.
    pub fuel_consumed: u64,

    /// Total invocation duration.
    pub duration: Option<Duration>,
}

impl GuestContext {
    /// Create a new guest context for one invocation.
    ///
    /// Binds the given environment pairs (in order) as WASI environment
    /// variables and replaces the guest's standard output with an in-memory
    /// capture pipe of `max_output_bytes` capacity. Returns the context and
    /// a handle to the capture pipe; the pipe handle stays valid after the
    /// context is dropped.
    ///
    /// # Arguments
    ///
    /// * `module_id` - Identifier of the module being invoked
    /// * `env` - Request-derived environment map
    /// * `max_output_bytes` - Capacity of the stdout capture buffer
    pub fn new(
        module_id: &str,
        env: &[(String, String)],
        max_output_bytes: usize,
    ) -> (Self, MemoryOutputPipe) {
        let stdout = MemoryOutputPipe::new(max_output_bytes);

        let mut builder = WasiCtxBuilder::new();
        builder.stdout(stdout.clone());
        for (key, value) in env {
            builder.env(key, value);
        }
        let wasi = builder.build_p1();

        let context = Self {
            wasi,
            module_id: module_id.to_string(),
            guest_logs: Vec::new(),
            metrics: ExecutionMetrics::default(),
            start_time: Instant::now(),
        };

        (context, stdout)
    }

    /// Identifier of the module this context belongs to.
    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Record a log entry emitted by the guest.
    pub fn record_guest_log(&mut self, message: String) {
        self.guest_logs.push(GuestLog {
            message,
            timestamp: Instant::now(),
        });
    }

    /// Get elapsed time since the invocation started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Finalize metrics after execution.
    pub fn finalize_metrics(&mut self) {
        self.metrics.duration = Some(self.start_time.elapsed());
    }

    /// Access the WASI context, for linking the system-call shim.
    pub(crate) fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }
}

impl std::fmt::Debug for GuestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestContext")
            .field("module_id", &self.module_id)
            .field("guest_logs", &self.guest_logs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let env = vec![("http_method".to_string(), "GET".to_string())];
        let (ctx, _stdout) = GuestContext::new("echo", &env, 4096);

        assert_eq!(ctx.module_id(), "echo");
        assert!(ctx.guest_logs.is_empty());
        assert_eq!(ctx.metrics.fuel_consumed, 0);
        assert!(ctx.metrics.duration.is_none());
    }

    #[test]
    fn test_record_guest_log() {
        let (mut ctx, _stdout) = GuestContext::new("logger", &[], 4096);

        ctx.record_guest_log("first".to_string());
        ctx.record_guest_log("second".to_string());

        assert_eq!(ctx.guest_logs.len(), 2);
        assert_eq!(ctx.guest_logs[0].message, "first");
        assert_eq!(ctx.guest_logs[1].message, "second");
    }

    #[test]
    fn test_finalize_metrics() {
        let (mut ctx, _stdout) = GuestContext::new("m", &[], 4096);

        ctx.finalize_metrics();
        assert!(ctx.metrics.duration.is_some());
    }

    #[test]
    fn test_capture_pipe_starts_empty() {
        let (_ctx, stdout) = GuestContext::new("m", &[], 4096);
        assert!(stdout.contents().is_empty());
    }
}
