//! Build script for ctorch-rs.
//!
//! Linking against libtorch is done by `torch-sys` (through `tch`). This
//! script only locates the same libtorch to record its version, check that
//! the `cuda` feature matches the installed PyTorch variant, and add an
//! rpath so test binaries and the cdylib find libtorch at runtime.
//!
//! # Environment Variables
//!
//! - `LIBTORCH`: Path to libtorch installation (optional, auto-detected from Python if not set)
//! - `CTORCH_SKIP_DETECT`: Set to "1" to skip detection entirely

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// PyTorch device variant detected from version string.
#[derive(Debug, Clone, PartialEq)]
enum TorchDevice {
    Cuda(String), // e.g., "cu128"
    Rocm(String), // e.g., "rocm7.0"
    Cpu,
}

/// Parse the device variant from a torch version string.
/// Examples: "2.5.1+cu124" -> Cuda("cu124"), "2.5.1+rocm6.2" -> Rocm("rocm6.2")
fn parse_torch_device(version: &str) -> TorchDevice {
    match version.split('+').nth(1) {
        Some(suffix) if suffix.starts_with("cu") => TorchDevice::Cuda(suffix.to_string()),
        Some(suffix) if suffix.starts_with("rocm") => TorchDevice::Rocm(suffix.to_string()),
        _ => TorchDevice::Cpu,
    }
}

/// Panic with a helpful message if the `cuda` feature is on but the
/// installed PyTorch has no CUDA support.
fn validate_torch_feature_match(version: &str) {
    if !cfg!(feature = "cuda") {
        return;
    }
    let installed = match parse_torch_device(version) {
        TorchDevice::Cuda(_) => return,
        TorchDevice::Rocm(v) => format!("ROCm ({})", v),
        TorchDevice::Cpu => "CPU".to_string(),
    };

    panic!(
        "\n\
        \n\
        error: PyTorch/feature mismatch detected\n\
        \n\
          Cargo feature: cuda\n\
          PyTorch installed: {installed}\n\
          PyTorch version: {version}\n\
        \n\
        The installed PyTorch does not have CUDA support.\n\
        Install a CUDA build of PyTorch or build without `--features cuda`.\n"
    );
}

/// Python executables to try, venvs next to the crate first.
fn python_candidates(manifest_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for name in [".venv", ".venv-cuda"] {
        candidates.push(manifest_dir.join(format!("../{}/bin/python", name)));
        candidates.push(manifest_dir.join(format!("{}/bin/python", name)));
    }
    candidates.push(PathBuf::from("python3"));
    candidates.push(PathBuf::from("python"));
    candidates
}

/// Run a Python snippet and return its trimmed stdout.
fn python_eval(python: &Path, code: &str) -> Option<String> {
    let output = Command::new(python).args(["-c", code]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8(output.stdout).ok()?;
    let value = stdout.trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Detect libtorch from the first Python with torch installed.
///
/// Returns (torch_path, python_executable) on success.
fn detect_libtorch_from_python(manifest_dir: &Path) -> Option<(PathBuf, PathBuf)> {
    python_candidates(manifest_dir).into_iter().find_map(|python| {
        let path = python_eval(&python, "import torch; print(torch.__path__[0])")?;
        Some((PathBuf::from(path), python))
    })
}

fn main() {
    println!("cargo:rerun-if-env-changed=LIBTORCH");
    println!("cargo:rerun-if-env-changed=CTORCH_SKIP_DETECT");

    if env::var("CTORCH_SKIP_DETECT")
        .map(|v| v == "1")
        .unwrap_or(false)
    {
        println!("cargo:warning=Skipping libtorch detection (CTORCH_SKIP_DETECT=1)");
        return;
    }

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => return,
    };

    let (libtorch, python) = if let Ok(path) = env::var("LIBTORCH") {
        let python = python_candidates(&manifest_dir)
            .into_iter()
            .find(|p| Command::new(p).arg("--version").output().is_ok());
        (PathBuf::from(path), python)
    } else if let Some((path, python)) = detect_libtorch_from_python(&manifest_dir) {
        eprintln!("info: Auto-detected PyTorch from Python: {}", path.display());
        (path, Some(python))
    } else {
        println!("cargo:warning=Could not locate libtorch; leaving it to torch-sys");
        return;
    };

    // Emit libtorch version for `info` and validate feature compatibility
    if let Some(version) = python
        .as_deref()
        .and_then(|p| python_eval(p, "import torch; print(torch.__version__)"))
    {
        println!("cargo:rustc-env=LIBTORCH_VERSION={}", version);
        validate_torch_feature_match(&version);
    }

    let lib_dir = libtorch.join("lib");
    if lib_dir.exists() {
        // Use RPATH (not RUNPATH) for reliable library discovery
        println!("cargo:rustc-link-arg=-Wl,--disable-new-dtags");
        println!("cargo:rustc-link-arg=-Wl,-rpath,{}", lib_dir.display());
    }
}
