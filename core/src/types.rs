//! Portable element-type and device tags.
//!
//! Callers across the C boundary pass these as plain integers. They are
//! stable across libtorch releases and are translated to `tch::Kind` and
//! `tch::Device` at every entry point that accepts them.

use std::fmt;
use std::str::FromStr;

use tch::{Device, Kind};
use tracing::error;

use crate::error::{Result, TorchError};

/// Portable element type (`torch_data_t`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    UInt8 = 0,
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Int64 = 4,
    Float16 = 5,
    Float32 = 6,
    Float64 = 7,
}

impl DataType {
    /// All tags, in discriminant order.
    pub const ALL: [DataType; 8] = [
        DataType::UInt8,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Float16,
        DataType::Float32,
        DataType::Float64,
    ];
}

impl TryFrom<i32> for DataType {
    type Error = TorchError;

    fn try_from(tag: i32) -> Result<Self> {
        usize::try_from(tag)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(TorchError::UnknownDataType(tag))
    }
}

impl From<DataType> for Kind {
    fn from(dtype: DataType) -> Self {
        match dtype {
            DataType::UInt8 => Kind::Uint8,
            DataType::Int8 => Kind::Int8,
            DataType::Int16 => Kind::Int16,
            DataType::Int32 => Kind::Int,
            DataType::Int64 => Kind::Int64,
            DataType::Float16 => Kind::Half,
            DataType::Float32 => Kind::Float,
            DataType::Float64 => Kind::Double,
        }
    }
}

impl FromStr for DataType {
    type Err = TorchError;

    /// Parse names like "float32", "f32", "int64", "u8".
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "uint8" | "u8" => Ok(Self::UInt8),
            "int8" | "i8" => Ok(Self::Int8),
            "int16" | "i16" => Ok(Self::Int16),
            "int32" | "i32" => Ok(Self::Int32),
            "int64" | "i64" => Ok(Self::Int64),
            "float16" | "f16" | "half" => Ok(Self::Float16),
            "float32" | "f32" | "float" => Ok(Self::Float32),
            "float64" | "f64" | "double" => Ok(Self::Float64),
            other => Err(TorchError::config(format!("Invalid dtype: {}", other))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UInt8 => "uint8",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// Portable device (`torch_device_t`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Cpu = 0,
    Cuda = 1,
}

impl TryFrom<i32> for DeviceType {
    type Error = TorchError;

    fn try_from(tag: i32) -> Result<Self> {
        match tag {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Cuda),
            other => Err(TorchError::UnknownDevice(other)),
        }
    }
}

impl From<DeviceType> for Device {
    fn from(device: DeviceType) -> Self {
        match device {
            DeviceType::Cpu => Device::Cpu,
            DeviceType::Cuda => Device::Cuda(0),
        }
    }
}

impl FromStr for DeviceType {
    type Err = TorchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "cuda:0" => Ok(Self::Cuda),
            other => Err(TorchError::config(format!("Invalid device: {}", other))),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

/// Translate a raw element-type tag, falling back to float32.
pub fn data_type_or_default(tag: i32) -> Kind {
    match DataType::try_from(tag) {
        Ok(dtype) => dtype.into(),
        Err(_) => {
            error!(tag, "unknown data type, setting to torch_kFloat32");
            Kind::Float
        }
    }
}

/// Translate a raw device tag, falling back to the CPU.
pub fn device_or_default(tag: i32) -> Device {
    match DeviceType::try_from(tag) {
        Ok(device) => device.into(),
        Err(_) => {
            error!(tag, "unknown device type, setting to torch_kCPU");
            Device::Cpu
        }
    }
}
