//! ctorch-rs: a C-linkage shim over libtorch tensors and TorchScript models.
//!
//! The crate builds as a `cdylib`/`staticlib` exporting the `torch_*`
//! functions declared in `include/ctorch.h`, for languages that can call C
//! but have no libtorch bindings of their own. Each function forwards to
//! libtorch through [`tch`]: tensor creation (zeros, ones, empty, wrapping
//! caller memory), printing, deletion, model loading and forward passes.
//!
//! Rust callers can use the typed API directly:
//!
//! ```ignore
//! use ctorch_rs::{tensor, DataType, DeviceType, Model};
//!
//! let model = Model::load("model.pt")?;
//! let x = tensor::ones(&[2, 3], DataType::Float32, DeviceType::Cpu)?;
//! let y = model.forward(&[x])?;
//! tensor::print(&y);
//! ```
//!
//! # Failure policy
//!
//! Element-type and device tags outside the portable enums fall back to
//! float32 and CPU with a diagnostic. Every other failure at the C boundary
//! is fatal: the message goes to stderr and the process exits, unless the
//! caller switched to [`FatalPolicy::Report`] with `torch_set_fatal_policy`.
//!
//! # Building
//!
//! libtorch is located by `tch` (`LIBTORCH`, or `LIBTORCH_USE_PYTORCH=1`
//! with PyTorch installed in the active Python).
//!
//! ```bash
//! LIBTORCH_USE_PYTORCH=1 cargo build --release
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod ffi;
pub mod inference;
pub mod tensor;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TorchError};
pub use ffi::FatalPolicy;
pub use inference::{Model, SyncPolicy};
pub use tensor::TensorData;
pub use types::{DataType, DeviceType};
