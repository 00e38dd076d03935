//! Wasmtime engine configuration and creation.
//!
//! The [`WasmEngine`] is the foundation of the gateway. It is:
//! - Thread-safe and shared across all requests
//! - Configured with pooling allocator for fast instantiation
//! - Set up with fuel metering and epoch interruption for resource limiting
//!
//! The engine itself holds no per-request state; every request gets its own
//! store, linker, and instance from [`crate::SandboxFactory`].

use std::sync::Arc;

use tracing::info;
use wasmtime::{Config, Engine, InstanceAllocationStrategy, PoolingAllocationConfig};

use wasmgate_common::{EngineConfig, GatewayError};

/// Thread-safe WebAssembly engine wrapper.
///
/// # Configuration
///
/// The engine is configured with:
/// - **Async Support**: Guest execution runs on the tokio runtime
/// - **Fuel Metering**: Enables deterministic CPU limiting
/// - **Epoch Interruption**: Enables the per-invocation deadline
/// - **Pooling Allocator**: Pre-reserves instance memory, keeping the
///   fresh-sandbox-per-request model cheap
#[derive(Clone)]
pub struct WasmEngine {
    engine: Arc<Engine>,
    config: EngineConfig,
}

impl WasmEngine {
    /// Create a new WebAssembly engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The Wasmtime configuration is invalid
    /// - The pooling allocator cannot be initialized
    pub fn new(config: &EngineConfig) -> Result<Self, GatewayError> {
        let mut wasmtime_config = Config::new();

        // Enable async support for non-blocking guest execution
        wasmtime_config.async_support(true);

        // Enable fuel metering for deterministic CPU limiting
        wasmtime_config.consume_fuel(true);

        // Enable epoch-based interruption for the execution deadline
        if config.epoch_interruption {
            wasmtime_config.epoch_interruption(true);
        }

        // Enable Cranelift optimizations
        wasmtime_config.cranelift_opt_level(wasmtime::OptLevel::Speed);

        // Configure pooling allocator for high-performance instantiation
        if config.pooling_allocator {
            let pooling_config = Self::create_pooling_config(config);

            wasmtime_config
                .allocation_strategy(InstanceAllocationStrategy::Pooling(pooling_config));

            info!(
                max_instances = config.max_instances,
                instance_memory_mb = config.instance_memory_mb,
                "Pooling allocator enabled"
            );
        }

        let engine = Engine::new(&wasmtime_config).map_err(|e| {
            GatewayError::invalid_config(format!("Failed to create Wasmtime engine: {e}"))
        })?;

        info!("Wasmtime engine initialized");

        Ok(Self {
            engine: Arc::new(engine),
            config: config.clone(),
        })
    }

    /// Create pooling allocation configuration.
    fn create_pooling_config(config: &EngineConfig) -> PoolingAllocationConfig {
        let mut pooling = PoolingAllocationConfig::default();

        // Total number of component instances that can be allocated
        pooling.total_component_instances(config.max_instances);

        // Total number of core module instances
        pooling.total_core_instances(config.max_instances);

        // Total number of memories across all instances
        pooling.total_memories(config.max_instances);

        // Total number of tables across all instances
        pooling.total_tables(config.max_instances);

        // Maximum size of a single memory in bytes
        let max_memory_bytes = (config.instance_memory_mb as usize) * 1024 * 1024;
        pooling.max_memory_size(max_memory_bytes);

        pooling
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Increment the epoch counter.
    ///
    /// This should be called periodically (e.g., every 1ms) to enable
    /// epoch-based interruption for long-running executions.
    pub fn increment_epoch(&self) {
        self.engine.increment_epoch();
    }

    /// Check if the pooling allocator is enabled.
    pub fn is_pooling_enabled(&self) -> bool {
        self.config.pooling_allocator
    }
}

impl std::fmt::Debug for WasmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEngine")
            .field("pooling_allocator", &self.config.pooling_allocator)
            .field("max_instances", &self.config.max_instances)
            .field("instance_memory_mb", &self.config.instance_memory_mb)
            .finish_non_exhaustive()
    }
}
