//! C-linkage entry points.
//!
//! Every function converts raw handles and tags into typed calls on the
//! safe API and runs inside [`runtime::guard`], so a failure is reported on
//! stderr and then either terminates the process (the default) or is left
//! in `torch_last_error` for the caller. The declarations for C callers
//! live in `include/ctorch.h`.
//!
//! The first call installs a stderr `tracing` subscriber as the global
//! default when none is set. A Rust host that wants its own subscriber must
//! install it before calling into this module; a later
//! `tracing_subscriber::fmt().init()` panics because the global default is
//! already taken (`try_init` returns an error instead).

mod handle;
mod runtime;

use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;
use std::slice;

use tch::{IValue, Tensor};
use tracing::error;

use crate::error::{Result, TorchError};
use crate::inference::{Model, SyncPolicy};
use crate::tensor;
use crate::types::{data_type_or_default, device_or_default};

use runtime::guard;

pub use handle::{HandleKind, ModelHandle, TensorHandle};
pub use runtime::{
    apply_runtime_config, device_sync, fatal_policy, set_device_sync, set_fatal_policy,
    FatalPolicy, EXIT_FAILURE,
};

/// View a caller array of `ndim` extents.
unsafe fn dims<'a>(values: *const i64, ndim: c_int, what: &str) -> Result<&'a [i64]> {
    let len = usize::try_from(ndim)
        .map_err(|_| TorchError::invalid_argument(format!("negative ndim: {}", ndim)))?;
    if len == 0 {
        return Ok(&[]);
    }
    if values.is_null() {
        return Err(TorchError::invalid_argument(format!(
            "null {} array with ndim {}",
            what, ndim
        )));
    }
    Ok(slice::from_raw_parts(values, len))
}

type Factory = fn(&[i64], tch::Kind, tch::Device) -> Result<Tensor>;

unsafe fn create(
    factory: Factory,
    ndim: c_int,
    shape: *const i64,
    dtype: c_int,
    device: c_int,
) -> TensorHandle {
    guard(ptr::null_mut(), || {
        let shape = dims(shape, ndim, "shape")?;
        let tensor = factory(shape, data_type_or_default(dtype), device_or_default(device))?;
        Ok(handle::into_handle(tensor))
    })
}

/// Create a zero-filled tensor.
///
/// # Safety
///
/// `shape` must point to `ndim` readable `int64_t` values.
#[no_mangle]
pub unsafe extern "C" fn torch_zeros(
    ndim: c_int,
    shape: *const i64,
    dtype: c_int,
    device: c_int,
) -> TensorHandle {
    create(tensor::zeros_native, ndim, shape, dtype, device)
}

/// Create a one-filled tensor.
///
/// # Safety
///
/// `shape` must point to `ndim` readable `int64_t` values.
#[no_mangle]
pub unsafe extern "C" fn torch_ones(
    ndim: c_int,
    shape: *const i64,
    dtype: c_int,
    device: c_int,
) -> TensorHandle {
    create(tensor::ones_native, ndim, shape, dtype, device)
}

/// Create an uninitialized tensor.
///
/// # Safety
///
/// `shape` must point to `ndim` readable `int64_t` values.
#[no_mangle]
pub unsafe extern "C" fn torch_empty(
    ndim: c_int,
    shape: *const i64,
    dtype: c_int,
    device: c_int,
) -> TensorHandle {
    create(tensor::empty_native, ndim, shape, dtype, device)
}

/// Expose caller memory as a tensor without taking ownership of it.
///
/// # Safety
///
/// `shape` and `strides` must each point to `ndim` readable `int64_t`
/// values, and `data` must cover every element they address and outlive the
/// returned handle.
#[no_mangle]
pub unsafe extern "C" fn torch_from_blob(
    data: *mut c_void,
    ndim: c_int,
    shape: *const i64,
    strides: *const i64,
    dtype: c_int,
    device: c_int,
) -> TensorHandle {
    guard(ptr::null_mut(), || {
        let shape = dims(shape, ndim, "shape")?;
        let strides = dims(strides, ndim, "strides")?;
        let tensor = tensor::from_blob_native(
            data,
            shape,
            strides,
            data_type_or_default(dtype),
            device_or_default(device),
        )?;
        Ok(handle::into_handle(tensor))
    })
}

/// Expose row-major contiguous caller memory as a tensor.
///
/// # Safety
///
/// As [`torch_from_blob`], with strides implied by `shape`.
#[no_mangle]
pub unsafe extern "C" fn torch_from_blob_contiguous(
    data: *mut c_void,
    ndim: c_int,
    shape: *const i64,
    dtype: c_int,
    device: c_int,
) -> TensorHandle {
    guard(ptr::null_mut(), || {
        let shape = dims(shape, ndim, "shape")?;
        let strides = tensor::contiguous_strides(shape)?;
        let tensor = tensor::from_blob_native(
            data,
            shape,
            &strides,
            data_type_or_default(dtype),
            device_or_default(device),
        )?;
        Ok(handle::into_handle(tensor))
    })
}

/// Print a tensor to stdout.
///
/// # Safety
///
/// `tensor` must be a live handle from this library.
#[no_mangle]
pub unsafe extern "C" fn torch_tensor_print(tensor: TensorHandle) {
    guard((), || {
        let t = handle::borrow::<Tensor>(tensor)?;
        crate::tensor::print(t);
        Ok(())
    })
}

/// Release a tensor handle. The wrapped memory of a blob tensor is not freed.
///
/// # Safety
///
/// `tensor` must be null or a live handle, and is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn torch_tensor_delete(tensor: TensorHandle) {
    guard((), || handle::release::<Tensor>(tensor))
}

/// Load a TorchScript module from `filename`.
///
/// # Safety
///
/// `filename` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn torch_jit_load(filename: *const c_char) -> ModelHandle {
    guard(ptr::null_mut(), || {
        if filename.is_null() {
            return Err(TorchError::invalid_argument("null filename"));
        }
        let path = CStr::from_ptr(filename)
            .to_str()
            .map_err(|_| TorchError::invalid_argument("filename is not valid UTF-8"))?;
        let model = Model::load(Path::new(path))?;
        Ok(handle::into_handle(model))
    })
}

/// Run the module's forward pass and write the tensor result into `output`.
///
/// Inputs are checked before the module runs; a null input counts as a
/// non-tensor value.
///
/// # Safety
///
/// `module` and `output` must be live handles and `inputs` must point to
/// `nin` tensor handles.
#[no_mangle]
pub unsafe extern "C" fn torch_jit_module_forward(
    module: ModelHandle,
    inputs: *const TensorHandle,
    nin: c_int,
    output: TensorHandle,
) {
    guard((), || {
        let handles = handle_array(inputs, nin)?;
        let mut values = Vec::with_capacity(handles.len());
        for (index, &h) in handles.iter().enumerate() {
            if h.is_null() {
                return Err(TorchError::InputNotTensor { index });
            }
            let t = handle::borrow::<Tensor>(h)?;
            values.push(IValue::Tensor(t.shallow_clone()));
        }
        let model = handle::borrow::<Model>(module)?;
        let out = handle::borrow_mut::<Tensor>(output)?;
        model.forward_into(values.as_slice(), out, device_sync())
    })
}

unsafe fn handle_array<'a>(
    inputs: *const TensorHandle,
    nin: c_int,
) -> Result<&'a [TensorHandle]> {
    let len = usize::try_from(nin)
        .map_err(|_| TorchError::invalid_argument(format!("negative input count: {}", nin)))?;
    if len == 0 {
        return Ok(&[]);
    }
    if inputs.is_null() {
        return Err(TorchError::invalid_argument("null inputs array"));
    }
    Ok(slice::from_raw_parts(inputs, len))
}

/// Release a model handle.
///
/// # Safety
///
/// `module` must be null or a live model handle, and is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn torch_jit_module_delete(module: ModelHandle) {
    guard((), || handle::release::<Model>(module))
}

/// Set the fatal-error policy (0 = exit, 1 = report). Returns the previous one.
#[no_mangle]
pub extern "C" fn torch_set_fatal_policy(policy: c_int) -> c_int {
    runtime::ensure_logging();
    let requested = match policy {
        0 => FatalPolicy::Exit,
        1 => FatalPolicy::Report,
        other => {
            error!(policy = other, "unknown fatal policy, keeping the current one");
            fatal_policy()
        }
    };
    match set_fatal_policy(requested) {
        FatalPolicy::Exit => 0,
        FatalPolicy::Report => 1,
    }
}

/// Enable (non-zero) or disable (0) device synchronization after forward
/// passes. Returns the previous setting.
#[no_mangle]
pub extern "C" fn torch_set_device_sync(enabled: c_int) -> c_int {
    let sync = if enabled != 0 {
        SyncPolicy::Always
    } else {
        SyncPolicy::Never
    };
    match set_device_sync(sync) {
        SyncPolicy::Always => 1,
        SyncPolicy::Never => 0,
    }
}

/// Borrow the tensor behind a handle, for Rust code sharing handles with C.
///
/// # Safety
///
/// `handle` must be a live tensor handle that is not released while the
/// reference is in use.
pub unsafe fn borrow_tensor<'a>(handle: TensorHandle) -> Result<&'a Tensor> {
    handle::borrow::<Tensor>(handle)
}

/// Message of the last failed call on this thread under the report policy,
/// or null. Valid until the next call into this library on the same thread.
#[no_mangle]
pub extern "C" fn torch_last_error() -> *const c_char {
    runtime::last_error_ptr()
}
