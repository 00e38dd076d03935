//! Module identifier to bytecode resolution.
//!
//! Bytecode for identifier `X` lives at `<dir>/X.wasm`. Identifiers are
//! validated against a safe character class before any path is built, so
//! untrusted input never reaches the filesystem as a traversal sequence.
//! Every lookup is one fresh read; nothing is cached across requests.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use wasmgate_common::{GatewayError, ModuleStoreConfig};

/// File extension of bytecode artifacts.
const ARTIFACT_EXTENSION: &str = "wasm";

/// Maps module identifiers to on-disk bytecode artifacts.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    dir: PathBuf,
}

impl ModuleResolver {
    /// Create a resolver rooted at the given artifact directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a resolver from the module store configuration.
    pub fn from_config(config: &ModuleStoreConfig) -> Self {
        Self::new(&config.dir)
    }

    /// The artifact directory this resolver reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve an identifier to its artifact path.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidModuleId`] for identifiers outside
    /// the safe character class.
    pub fn artifact_path(&self, module_id: &str) -> Result<PathBuf, GatewayError> {
        validate_module_id(module_id)?;
        Ok(self.dir.join(format!("{module_id}.{ARTIFACT_EXTENSION}")))
    }

    /// Read the bytecode artifact for the given identifier.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidModuleId`] for unsafe identifiers
    /// - [`GatewayError::ModuleNotFound`] (naming the attempted path) if
    ///   the artifact does not exist or cannot be read
    pub async fn load(&self, module_id: &str) -> Result<Vec<u8>, GatewayError> {
        let path = self.artifact_path(module_id)?;

        debug!(path = %path.display(), "Loading module artifact");

        tokio::fs::read(&path).await.map_err(|e| {
            warn!(path = %path.display(), error = %e, "Module artifact unreadable");
            GatewayError::module_not_found(path.display().to_string())
        })
    }
}

/// Check an identifier against the safe character class `[A-Za-z0-9_-]`.
///
/// Rejecting everything else (separators, dots, percent sequences) keeps
/// traversal out of the artifact path by construction.
pub fn validate_module_id(module_id: &str) -> Result<(), GatewayError> {
    if module_id.is_empty() {
        return Err(GatewayError::invalid_module_id("empty identifier"));
    }

    if !module_id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(GatewayError::invalid_module_id(format!(
            "identifier '{module_id}' contains characters outside [A-Za-z0-9_-]"
        )));
    }

    Ok(())
}
