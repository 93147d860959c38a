//! Tensor factory and readback.
//!
//! Shapes and strides are forwarded to libtorch uninspected; any
//! inconsistency is reported by libtorch, not here.

use std::ffi::c_void;

use ndarray::{ArrayD, IxDyn};
use tch::{Device, Kind, Tensor};

use crate::error::{Result, TorchError};
use crate::types::{DataType, DeviceType};

/// Create a zero-filled tensor.
pub fn zeros(shape: &[i64], dtype: DataType, device: DeviceType) -> Result<Tensor> {
    zeros_native(shape, dtype.into(), device.into())
}

/// Create a one-filled tensor.
pub fn ones(shape: &[i64], dtype: DataType, device: DeviceType) -> Result<Tensor> {
    ones_native(shape, dtype.into(), device.into())
}

/// Create an uninitialized tensor.
pub fn empty(shape: &[i64], dtype: DataType, device: DeviceType) -> Result<Tensor> {
    empty_native(shape, dtype.into(), device.into())
}

pub(crate) fn zeros_native(shape: &[i64], kind: Kind, device: Device) -> Result<Tensor> {
    Ok(Tensor::f_zeros(shape, (kind, device))?)
}

pub(crate) fn ones_native(shape: &[i64], kind: Kind, device: Device) -> Result<Tensor> {
    Ok(Tensor::f_ones(shape, (kind, device))?)
}

pub(crate) fn empty_native(shape: &[i64], kind: Kind, device: Device) -> Result<Tensor> {
    Ok(Tensor::f_empty(shape, (kind, device))?)
}

/// Wrap caller-owned memory as a tensor without copying it.
///
/// # Safety
///
/// `data` must point to memory on `device` that holds every element
/// addressed by `shape` and `strides`, and must stay valid for as long as
/// the returned tensor (or any view of it) is alive. The memory is never
/// freed by this crate.
pub unsafe fn from_blob(
    data: *mut c_void,
    shape: &[i64],
    strides: &[i64],
    dtype: DataType,
    device: DeviceType,
) -> Result<Tensor> {
    from_blob_native(data, shape, strides, dtype.into(), device.into())
}

/// Wrap caller-owned, row-major contiguous memory as a tensor.
///
/// # Safety
///
/// Same contract as [`from_blob`].
pub unsafe fn from_blob_contiguous(
    data: *mut c_void,
    shape: &[i64],
    dtype: DataType,
    device: DeviceType,
) -> Result<Tensor> {
    let strides = contiguous_strides(shape)?;
    from_blob_native(data, shape, &strides, dtype.into(), device.into())
}

pub(crate) unsafe fn from_blob_native(
    data: *mut c_void,
    shape: &[i64],
    strides: &[i64],
    kind: Kind,
    device: Device,
) -> Result<Tensor> {
    if data.is_null() {
        return Err(TorchError::invalid_argument("null data pointer"));
    }
    let tensor = Tensor::f_from_blob(data as *const u8, shape, strides, kind, device)?;
    Ok(tensor)
}

/// Row-major element strides for `shape`.
///
/// Fails with `InvalidArgument` when a stride does not fit in an `i64`.
pub fn contiguous_strides(shape: &[i64]) -> Result<Vec<i64>> {
    let mut strides = vec![1i64; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1]
            .checked_mul(shape[i + 1].max(1))
            .ok_or_else(|| {
                TorchError::invalid_argument(format!("stride overflow for shape {:?}", shape))
            })?;
    }
    Ok(strides)
}

/// Write libtorch's rendering of `tensor` to stdout.
pub fn print(tensor: &Tensor) {
    tensor.print();
}

/// Tensor contents copied out of libtorch.
#[derive(Debug, Clone)]
pub struct TensorData {
    /// The tensor data as a dynamic-dimensional array.
    pub data: ArrayD<f32>,
}

impl TensorData {
    /// Copy `tensor` to host memory as f32, whatever its kind and device.
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        let shape: Vec<usize> = tensor.size().iter().map(|&s| s as usize).collect();
        let flat = tensor
            .f_to(Device::Cpu)?
            .f_to_kind(Kind::Float)?
            .f_contiguous()?
            .f_flatten(0, -1)?;
        let values = Vec::<f32>::try_from(&flat)?;
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| TorchError::invalid_argument(format!("Array shape error: {}", e)))?;
        Ok(Self { data })
    }

    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Get the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Get the total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl TryFrom<&Tensor> for TensorData {
    type Error = TorchError;

    fn try_from(tensor: &Tensor) -> Result<Self> {
        Self::from_tensor(tensor)
    }
}
