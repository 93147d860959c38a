//! CLI entry point for ctorch-rs.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tch::Tensor;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ctorch_rs::cli::{Cli, Commands};
use ctorch_rs::config::Config;
use ctorch_rs::ffi;
use ctorch_rs::inference::synchronize;
use ctorch_rs::{tensor, DataType, DeviceType, Model, SyncPolicy, TensorData};

/// Get the libtorch version from the build script.
fn libtorch_version() -> &'static str {
    option_env!("LIBTORCH_VERSION").unwrap_or("unknown")
}

/// Get the enabled features.
fn enabled_features() -> &'static str {
    if cfg!(feature = "cuda") {
        "cuda"
    } else {
        "cpu"
    }
}

/// One input tensor as it appears in the JSON input file.
#[derive(Debug, Deserialize)]
struct InputTensor {
    data: Vec<f32>,
    shape: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputFile {
    One(InputTensor),
    Many(Vec<InputTensor>),
}

fn read_inputs(path: &Path, dtype: DataType, device: DeviceType) -> Result<Vec<Tensor>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input: {}", path.display()))?;
    let parsed: InputFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid input JSON: {}", path.display()))?;
    let items = match parsed {
        InputFile::One(t) => vec![t],
        InputFile::Many(ts) => ts,
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let tensor = Tensor::f_from_slice(item.data.as_slice())
                .and_then(|t| t.f_reshape(item.shape.as_slice()))
                .and_then(|t| t.f_to_kind(dtype.into()))
                .and_then(|t| t.f_to(device.into()))
                .with_context(|| format!("Failed to build input {}", i))?;
            Ok(tensor)
        })
        .collect()
}

fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    match cli.command {
        Commands::Run {
            model,
            input,
            device,
            dtype,
            format,
            config,
            print,
        } => {
            let config = if let Some(config_path) = config {
                Config::from_yaml_file(&config_path)
                    .with_context(|| format!("Failed to load config: {}", config_path.display()))?
            } else {
                Config::default()
            };
            ffi::apply_runtime_config(&config.runtime);

            let model = match model.or_else(|| config.model.path.as_ref().map(PathBuf::from)) {
                Some(path) => path,
                None => bail!("No model given: pass --model or set model.path in the config"),
            };

            let device: DeviceType = match device {
                Some(d) => d.parse()?,
                None => config.model.device()?,
            };
            let dtype: DataType = match dtype {
                Some(d) => d.parse()?,
                None => config.model.dtype()?,
            };
            info!("Using device: {}, dtype: {}", device, dtype);

            info!("Loading model: {}", model.display());
            let net = Model::load_on_device(&model, device)?;

            let inputs = read_inputs(&input, dtype, device)?;
            info!("Running forward pass on {} input(s)", inputs.len());

            let start = Instant::now();
            let out = net.forward(&inputs)?;
            synchronize(out.device(), ffi::device_sync());
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            if print {
                tensor::print(&out);
            }

            let data = TensorData::try_from(&out)?;
            let output = serde_json::json!({
                "latency_ms": latency_ms,
                "shape": data.shape(),
                "kind": format!("{:?}", out.kind()),
                "numel": data.len(),
                "values": data.data.iter().copied().collect::<Vec<f32>>(),
            });

            if format == "pretty" {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", serde_json::to_string(&output)?);
            }
        }

        Commands::Info { model } => {
            println!("ctorch-rs v{}", env!("CARGO_PKG_VERSION"));
            println!("libtorch: {}", libtorch_version());
            println!("features: {}", enabled_features());
            println!("cuda available: {}", tch::Cuda::is_available());
            println!("cuda devices: {}", tch::Cuda::device_count());

            if let Some(model) = model {
                println!();
                println!("Model: {}", model.display());
                info!("Loading model...");
                let _model = Model::load(&model)?;
                println!("Status: OK (model loaded successfully)");
            }
        }

        Commands::TestDevice { device, dtype } => {
            let device: DeviceType = device.parse()?;
            let dtype: DataType = dtype.parse()?;
            if device == DeviceType::Cuda && !tch::Cuda::is_available() {
                bail!("CUDA requested but no CUDA device is available");
            }
            println!("Testing device: {} ({})", device, dtype);
            println!();

            let zeros = tensor::zeros(&[2, 3], dtype, device)?;
            let ones = tensor::ones(&[4], dtype, device)?;
            let empty = tensor::empty(&[2, 2], dtype, device)?;
            for (name, t) in [("zeros", &zeros), ("ones", &ones), ("empty", &empty)] {
                println!("{}:", name);
                tensor::print(t);
            }
            synchronize(zeros.device(), SyncPolicy::Always);
            println!("Status: OK");
        }
    }

    Ok(())
}
