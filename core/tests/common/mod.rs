#![allow(dead_code)]

use anyhow::Result;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use tch::{CModule, Device, Kind, Tensor};

use ctorch_rs::ffi;

/// Trace `2 * x + y` and save it under `dir`.
pub fn affine_model(dir: &Path) -> Result<PathBuf> {
    let x = Tensor::zeros([2, 3], (Kind::Float, Device::Cpu));
    let y = Tensor::zeros([2, 3], (Kind::Float, Device::Cpu));
    let module = CModule::create_by_tracing("Affine", "forward", &[x, y], &mut |xs| {
        vec![&xs[0] * 2.0 + &xs[1]]
    })?;
    let path = dir.join("affine.pt");
    module.save(&path)?;
    Ok(path)
}

/// Trace a module returning two tensors, so `forward` yields a tuple.
pub fn pair_model(dir: &Path) -> Result<PathBuf> {
    let x = Tensor::zeros([2, 3], (Kind::Float, Device::Cpu));
    let module = CModule::create_by_tracing("Pair", "forward", &[x], &mut |xs| {
        vec![&xs[0] + 1.0, &xs[0] - 1.0]
    })?;
    let path = dir.join("pair.pt");
    module.save(&path)?;
    Ok(path)
}

/// Report fatal errors instead of exiting, so failures are observable.
pub fn report_errors() {
    ffi::set_fatal_policy(ffi::FatalPolicy::Report);
}

/// This thread's last boundary error.
pub fn last_error() -> Option<String> {
    let ptr = ffi::torch_last_error();
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}
