//! TorchScript model loading and forward-pass invocation.

use std::borrow::Borrow;
use std::path::Path;

use serde::Deserialize;
use tch::{CModule, Device, IValue, Tensor};
use tracing::debug;

use crate::error::{Result, TorchError};
use crate::types::DeviceType;

/// Whether to block on the device after a forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    /// Synchronize the output's CUDA device before returning.
    #[default]
    Always,
    /// Leave synchronization to the caller.
    Never,
}

/// A deserialized TorchScript module.
///
/// # Example
///
/// ```ignore
/// use ctorch_rs::{tensor, DataType, DeviceType, Model, SyncPolicy};
/// use tch::IValue;
///
/// let model = Model::load("model.pt")?;
/// let x = tensor::ones(&[2, 3], DataType::Float32, DeviceType::Cpu)?;
/// let mut out = tensor::empty(&[2, 3], DataType::Float32, DeviceType::Cpu)?;
/// model.forward_into(&[IValue::Tensor(x)], &mut out, SyncPolicy::Always)?;
/// ```
pub struct Model {
    module: CModule,
}

impl Model {
    /// Load a TorchScript module saved with `torch.jit.save`.
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` if `path` does not exist and `Torch` if
    /// libtorch rejects the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TorchError::FileNotFound(path.to_path_buf()));
        }
        let module = CModule::load(path)?;
        debug!(path = %path.display(), "model loaded");
        Ok(Self { module })
    }

    /// Load a TorchScript module with its parameters placed on `device`.
    pub fn load_on_device(path: impl AsRef<Path>, device: DeviceType) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TorchError::FileNotFound(path.to_path_buf()));
        }
        let module = CModule::load_on_device(path, device.into())?;
        debug!(path = %path.display(), %device, "model loaded");
        Ok(Self { module })
    }

    /// Wrap an already constructed module.
    pub fn from_module(module: CModule) -> Self {
        Self { module }
    }

    /// Run `forward` and copy its tensor result into `out`.
    ///
    /// Every input is checked before the module runs. The result replaces
    /// the contents of `out` in place, so an output wrapping caller memory
    /// receives the values directly.
    pub fn forward_into<V: Borrow<IValue>>(
        &self,
        inputs: &[V],
        out: &mut Tensor,
        sync: SyncPolicy,
    ) -> Result<()> {
        let result = self.forward_values(inputs)?;
        out.f_copy_(&result)?;
        synchronize(out.device(), sync);
        Ok(())
    }

    /// Run `forward` on tensor inputs and return the result.
    pub fn forward(&self, inputs: &[Tensor]) -> Result<Tensor> {
        let values: Vec<IValue> = inputs
            .iter()
            .map(|t| IValue::Tensor(t.shallow_clone()))
            .collect();
        self.forward_values(&values)
    }

    fn forward_values<V: Borrow<IValue>>(&self, inputs: &[V]) -> Result<Tensor> {
        if let Some(index) = inputs
            .iter()
            .position(|v| !matches!(v.borrow(), IValue::Tensor(_)))
        {
            return Err(TorchError::InputNotTensor { index });
        }
        match self.module.forward_is(inputs)? {
            IValue::Tensor(t) => Ok(t),
            other => Err(TorchError::OutputNotTensor(ivalue_kind(&other))),
        }
    }
}

/// Block until outstanding work on `device` completes, if the policy asks.
pub fn synchronize(device: Device, sync: SyncPolicy) {
    if sync == SyncPolicy::Never {
        return;
    }
    if let Device::Cuda(index) = device {
        tch::Cuda::synchronize(index as i64);
    }
}

fn ivalue_kind(value: &IValue) -> &'static str {
    match value {
        IValue::None => "None",
        IValue::Tensor(_) => "Tensor",
        IValue::Double(_) => "float",
        IValue::Int(_) => "int",
        IValue::Bool(_) => "bool",
        IValue::Tuple(_) => "tuple",
        IValue::IntList(_) => "int list",
        IValue::DoubleList(_) => "float list",
        IValue::BoolList(_) => "bool list",
        IValue::String(_) => "string",
        IValue::TensorList(_) => "tensor list",
        IValue::GenericList(_) => "list",
        IValue::GenericDict(_) => "dict",
        #[allow(unreachable_patterns)]
        _ => "non-tensor value",
    }
}
