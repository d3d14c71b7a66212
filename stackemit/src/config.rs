//! Emission options.
//!
//! The configuration bundle is small and usually built by the driver, but it
//! can also be read from a TOML table:
//!
//! ```toml
//! verifier_compat = true
//! supports_blob_initializers = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading emission options.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read options file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse options: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Target and compatibility settings consulted during emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitOptions {
    /// Emit only code the runtime verifier accepts. Disables read-only
    /// references into covariant arrays and references to fields of
    /// read-only receivers; copies are made instead.
    pub verifier_compat: bool,
    /// Whether the target can embed constant data blobs for initializing
    /// stack allocations.
    pub supports_blob_initializers: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            verifier_compat: false,
            supports_blob_initializers: true,
        }
    }
}

impl EmitOptions {
    /// Parse options from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load options from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn with_verifier_compat(mut self, enabled: bool) -> Self {
        self.verifier_compat = enabled;
        self
    }

    pub fn with_blob_initializers(mut self, supported: bool) -> Self {
        self.supports_blob_initializers = supported;
        self
    }
}
