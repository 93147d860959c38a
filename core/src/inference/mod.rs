//! Model inference module.
//!
//! Loading of TorchScript modules and validated forward passes.

mod model;

pub use model::{synchronize, Model, SyncPolicy};
