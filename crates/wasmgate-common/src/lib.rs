//! Common types, errors, and utilities for wasmgate.
//!
//! This crate provides shared functionality used across the wasmgate workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for runtime settings
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineConfig, ExecutionConfig, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError, ModuleStoreConfig, ServerConfigFile};
pub use error::GatewayError;
