//! Fatal errors under the default policy end the whole process.

mod common;

use anyhow::{Context, Result};
use std::env;
use std::ffi::{c_void, CString};
use std::path::Path;
use std::process::Command;

use ctorch_rs::ffi::{self, TensorHandle};
use ctorch_rs::{DataType, DeviceType};

const CHILD_ENV: &str = "CTORCH_FATAL_CHILD";
const MODEL_ENV: &str = "CTORCH_FATAL_MODEL";

/// Re-run this test binary on a single test with `CHILD_ENV` set.
fn run_child(test_name: &str) -> Result<std::process::Output> {
    run_child_with_model(test_name, None)
}

fn run_child_with_model(test_name: &str, model: Option<&Path>) -> Result<std::process::Output> {
    let mut cmd = Command::new(env::current_exe()?);
    cmd.args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1");
    if let Some(model) = model {
        cmd.env(MODEL_ENV, model);
    }
    Ok(cmd.output()?)
}

/// Load the model named by `MODEL_ENV` through the C boundary.
fn child_model() -> Result<ffi::ModelHandle> {
    let path = env::var(MODEL_ENV).context("model path not passed to child")?;
    let cpath = CString::new(path)?;
    Ok(unsafe { ffi::torch_jit_load(cpath.as_ptr()) })
}

#[test]
fn load_missing_model_exits_process() -> Result<()> {
    if env::var_os(CHILD_ENV).is_some() {
        ffi::set_fatal_policy(ffi::FatalPolicy::Exit);
        let path = CString::new("/no/such/model.pt")?;
        unsafe { ffi::torch_jit_load(path.as_ptr()) };
        unreachable!("torch_jit_load returned under the exit policy");
    }

    let output = run_child("load_missing_model_exits_process")?;
    assert_eq!(output.status.code(), Some(ffi::EXIT_FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("File not found: /no/such/model.pt"), "{}", stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("File not found"), "diagnostic leaked to stdout");
    Ok(())
}

#[test]
fn bad_shape_exits_process() -> Result<()> {
    if env::var_os(CHILD_ENV).is_some() {
        ffi::set_fatal_policy(ffi::FatalPolicy::Exit);
        let shape = [3i64, -1];
        unsafe { ffi::torch_ones(2, shape.as_ptr(), 6, 0) };
        unreachable!("torch_ones returned under the exit policy");
    }

    let output = run_child("bad_shape_exits_process")?;
    assert_eq!(output.status.code(), Some(ffi::EXIT_FAILURE));
    Ok(())
}

#[test]
fn null_input_forward_exits_process() -> Result<()> {
    if env::var_os(CHILD_ENV).is_some() {
        ffi::set_fatal_policy(ffi::FatalPolicy::Exit);
        let model = child_model()?;
        let shape = [2i64, 3];
        let strides = [3i64, 1];
        let mut out_buf = vec![-7.0f32; 6];
        let x = unsafe {
            ffi::torch_ones(2, shape.as_ptr(), DataType::Float32 as i32, DeviceType::Cpu as i32)
        };
        let out = unsafe {
            ffi::torch_from_blob(
                out_buf.as_mut_ptr() as *mut c_void,
                2,
                shape.as_ptr(),
                strides.as_ptr(),
                DataType::Float32 as i32,
                DeviceType::Cpu as i32,
            )
        };
        let inputs: [TensorHandle; 2] = [x, std::ptr::null_mut()];
        unsafe { ffi::torch_jit_module_forward(model, inputs.as_ptr(), 2, out) };
        println!("forward returned, output {:?}", out_buf);
        unreachable!("torch_jit_module_forward returned under the exit policy");
    }

    let dir = tempfile::tempdir()?;
    let model = common::affine_model(dir.path())?;
    let output = run_child_with_model("null_input_forward_exits_process", Some(&model))?;
    assert_eq!(output.status.code(), Some(ffi::EXIT_FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not a Tensor (input 1)"), "{}", stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("is not a Tensor"), "diagnostic leaked to stdout");
    assert!(!stdout.contains("forward returned"), "{}", stdout);
    Ok(())
}

#[test]
fn tuple_output_forward_exits_process() -> Result<()> {
    if env::var_os(CHILD_ENV).is_some() {
        ffi::set_fatal_policy(ffi::FatalPolicy::Exit);
        let model = child_model()?;
        let shape = [2i64, 3];
        let x = unsafe {
            ffi::torch_zeros(2, shape.as_ptr(), DataType::Float32 as i32, DeviceType::Cpu as i32)
        };
        let out = unsafe {
            ffi::torch_empty(2, shape.as_ptr(), DataType::Float32 as i32, DeviceType::Cpu as i32)
        };
        let inputs: [TensorHandle; 1] = [x];
        unsafe { ffi::torch_jit_module_forward(model, inputs.as_ptr(), 1, out) };
        unreachable!("torch_jit_module_forward returned under the exit policy");
    }

    let dir = tempfile::tempdir()?;
    let model = common::pair_model(dir.path())?;
    let output = run_child_with_model("tuple_output_forward_exits_process", Some(&model))?;
    assert_eq!(output.status.code(), Some(ffi::EXIT_FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("expected a Tensor"), "{}", stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("expected a Tensor"), "diagnostic leaked to stdout");
    Ok(())
}

#[test]
fn cli_missing_model_exits_nonzero() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_ctorch-rs"))
        .args(["info", "--model", "/no/such/model.pt"])
        .output()?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("File not found"), "{}", stderr);
    Ok(())
}
