//! Shared application state.
//!
//! [`AppState`] holds the pieces shared across request handlers: the
//! engine, the sandbox factory, and the module resolver. All of them are
//! immutable; per-request state lives entirely inside each invocation's
//! sandbox, so handlers need no cross-request synchronization.

use std::sync::Arc;

use wasmgate_common::{GatewayError, ModuleStoreConfig, RuntimeConfig};
use wasmgate_core::{SandboxFactory, WasmEngine};
use wasmgate_host::LogBridge;

use crate::resolver::ModuleResolver;

/// Shared state across all request handlers.
///
/// This struct is cloned for each request, so it uses `Arc` for shared data.
#[derive(Clone)]
pub struct AppState {
    /// Wasmtime engine (shared across all requests, stateless).
    engine: WasmEngine,

    /// Sandbox factory building one isolated instance per request.
    sandbox: Arc<SandboxFactory>,

    /// Module resolver reading artifacts fresh per request.
    resolver: Arc<ModuleResolver>,
}

impl AppState {
    /// Create new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be created.
    pub fn new(
        runtime: &RuntimeConfig,
        modules: &ModuleStoreConfig,
    ) -> Result<Self, GatewayError> {
        let engine = WasmEngine::new(&runtime.engine)?;
        let sandbox = SandboxFactory::new(
            engine.clone(),
            runtime.execution.clone(),
            Arc::new(LogBridge),
        );
        let resolver = ModuleResolver::from_config(modules);

        Ok(Self {
            engine,
            sandbox: Arc::new(sandbox),
            resolver: Arc::new(resolver),
        })
    }

    /// Get the Wasmtime engine.
    pub fn engine(&self) -> &WasmEngine {
        &self.engine
    }

    /// Get the sandbox factory.
    pub fn sandbox(&self) -> &SandboxFactory {
        &self.sandbox
    }

    /// Get the module resolver.
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("module_dir", &self.resolver.dir())
            .finish_non_exhaustive()
    }
}
