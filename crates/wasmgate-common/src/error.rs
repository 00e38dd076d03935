//! Error types for the wasmgate workspace.
//!
//! [`GatewayError`] covers every failure class a request can hit on its way
//! from the HTTP boundary through module resolution and sandboxed execution.
//! Each invocation failure is isolated to its own request handler; none of
//! these errors is ever fatal to the serving process.

use std::io;

use thiserror::Error;

/// Failures of the per-request invocation pipeline.
///
/// The variants map one-to-one onto the failure surface between untrusted
/// guest code and the serving process: request parsing, artifact lookup,
/// host-binding registration, bytecode loading, and guest execution.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The module identifier is empty or contains unsafe characters.
    ///
    /// Identifiers are restricted to `[A-Za-z0-9_-]` before any path is
    /// built from them, so traversal sequences never reach the filesystem.
    #[error("invalid module identifier: {reason}")]
    InvalidModuleId {
        /// Why the identifier was rejected.
        reason: String,
    },

    /// No bytecode artifact exists at the resolved path.
    #[error("unable to find module {path}")]
    ModuleNotFound {
        /// The artifact path that was sought.
        path: String,
    },

    /// Registering host bindings on the linker failed.
    ///
    /// This is an internal fault (conflicting or malformed host bindings),
    /// not something a client or a guest module can trigger.
    #[error("host linkage failed: {reason}")]
    LinkageFailed {
        /// Description of the registration failure.
        reason: String,
    },

    /// The bytecode failed validation, compilation, or import resolution.
    #[error("invalid module: {reason}")]
    InvalidModule {
        /// Description of what made the module unloadable.
        reason: String,
    },

    /// The guest trapped or exited with a non-zero status.
    ///
    /// Partial output written before the fault is discarded; only a fully
    /// successful run returns its captured output.
    #[error("execution failed: {message}")]
    ExecutionFailed {
        /// Human-readable description of the fault.
        message: String,
        /// Trap code or exit status, if one was available.
        code: Option<String>,
    },

    /// Execution exceeded the configured deadline.
    #[error("execution timeout after {duration_ms}ms")]
    ExecutionTimeout {
        /// The deadline in milliseconds.
        duration_ms: u64,
    },

    /// Execution exhausted the configured fuel limit.
    #[error("fuel exhausted: CPU limit exceeded")]
    FuelExhausted,

    /// Invalid configuration was provided.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl GatewayError {
    /// Create a new `InvalidModuleId` error.
    pub fn invalid_module_id(reason: impl Into<String>) -> Self {
        Self::InvalidModuleId {
            reason: reason.into(),
        }
    }

    /// Create a new `ModuleNotFound` error naming the attempted path.
    pub fn module_not_found(path: impl Into<String>) -> Self {
        Self::ModuleNotFound { path: path.into() }
    }

    /// Create a new `LinkageFailed` error.
    pub fn linkage_failed(reason: impl Into<String>) -> Self {
        Self::LinkageFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidModule` error.
    pub fn invalid_module(reason: impl Into<String>) -> Self {
        Self::InvalidModule {
            reason: reason.into(),
        }
    }

    /// Create a new `ExecutionFailed` error.
    pub fn execution_failed(message: impl Into<String>, code: Option<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
            code,
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error indicates the artifact was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound { .. })
    }

    /// Returns `true` if the client sent something unusable.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidModuleId { .. })
    }

    /// Returns `true` if this error indicates a resource limit was exceeded.
    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self,
            Self::FuelExhausted | Self::ExecutionTimeout { .. }
        )
    }
}
