//! Configuration types for ctorch-rs.
//!
//! The library itself reads no files; the CLI loads a YAML config and
//! applies its `runtime` section to the C boundary.

use serde::Deserialize;

use crate::error::Result;
use crate::ffi::FatalPolicy;
use crate::inference::SyncPolicy;
use crate::types::{DataType, DeviceType};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Boundary policy.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Model configuration.
    #[serde(default)]
    pub model: ModelConfig,
}

/// Boundary policy applied to every C entry point.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RuntimeConfig {
    /// What a fatal error does.
    #[serde(default)]
    pub on_fatal: FatalPolicy,

    /// Whether forward passes block on the CUDA device.
    #[serde(default)]
    pub device_sync: SyncPolicy,
}

/// Model configuration.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Path to the TorchScript file.
    #[serde(default)]
    pub path: Option<String>,

    /// Device to run on (cpu, cuda).
    #[serde(default = "default_device")]
    pub device: String,

    /// Element type of inputs built from JSON.
    #[serde(default = "default_dtype")]
    pub dtype: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            device: default_device(),
            dtype: default_dtype(),
        }
    }
}

impl ModelConfig {
    /// Parsed device.
    pub fn device(&self) -> Result<DeviceType> {
        self.device.parse()
    }

    /// Parsed element type.
    pub fn dtype(&self) -> Result<DataType> {
        self.dtype.parse()
    }
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_dtype() -> String {
    "float32".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}
