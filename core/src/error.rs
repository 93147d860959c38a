//! Error types for ctorch-rs.

use std::path::PathBuf;
use thiserror::Error;

use crate::ffi::HandleKind;

/// Result type alias for ctorch-rs operations.
pub type Result<T> = std::result::Result<T, TorchError>;

/// Errors raised while forwarding calls to libtorch.
#[derive(Debug, Error)]
pub enum TorchError {
    /// Error signaled by libtorch itself.
    #[error("{0}")]
    Torch(#[from] tch::TchError),

    /// An input to the forward pass is not a tensor.
    #[error("One of the inputs to torch_jit_module_forward is not a Tensor (input {index})")]
    InputNotTensor { index: usize },

    /// The forward pass returned something other than a tensor.
    #[error("forward returned {0}, expected a Tensor")]
    OutputNotTensor(&'static str),

    /// Element-type tag outside the portable enumeration.
    #[error("unknown data type tag: {0}")]
    UnknownDataType(i32),

    /// Device tag outside the portable enumeration.
    #[error("unknown device type tag: {0}")]
    UnknownDevice(i32),

    /// A null handle was passed where a live one is required.
    #[error("null {0} handle")]
    NullHandle(HandleKind),

    /// A handle that is not live (already released, never created, or of the other kind).
    #[error("{0} handle {1:#x} is not live")]
    StaleHandle(HandleKind, usize),

    /// Malformed argument at the C boundary.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File not found.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A panic caught at the C boundary.
    #[error("panic: {0}")]
    Panic(String),
}

impl TorchError {
    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TorchError::InputNotTensor { index: 2 };
        assert_eq!(
            format!("{}", err),
            "One of the inputs to torch_jit_module_forward is not a Tensor (input 2)"
        );

        let err = TorchError::config("invalid dtype");
        assert_eq!(format!("{}", err), "Configuration error: invalid dtype");

        let err = TorchError::FileNotFound(PathBuf::from("/path/to/model.pt"));
        assert_eq!(format!("{}", err), "File not found: /path/to/model.pt");

        let err = TorchError::StaleHandle(HandleKind::Tensor, 0x10);
        assert_eq!(format!("{}", err), "tensor handle 0x10 is not live");
    }
}
