//! Host function bridge for wasmgate.
//!
//! This crate provides the fixed set of capabilities a sandboxed module may
//! call into the serving process: two logging functions under the `env`
//! import namespace. The bridge is registered fresh on every invocation's
//! linker and reaches its invocation context (module identifier, log sink)
//! through the store data rather than any global state.
//!
//! # Fail-soft policy
//!
//! Logging is best-effort: a guest passing an invalid memory range to
//! `log_string` gets a host-side diagnostic, not a trap. Guest execution
//! continues uninterrupted.

pub mod bridge;

pub use bridge::LogBridge;
