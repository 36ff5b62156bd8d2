pub use candle_core::Device;
use candle_core::utils::{cuda_is_available, metal_is_available};

use crate::error::{Error, Result};

/// Which compute device to run the checkpoint on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DevicePreference {
    /// CUDA when compiled in and present, then Metal, otherwise CPU.
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

pub fn select_device(preference: DevicePreference) -> Result<Device> {
    let device = match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => cuda()?,
        DevicePreference::Metal => metal()?,
        DevicePreference::Auto if cuda_is_available() => cuda()?,
        DevicePreference::Auto if metal_is_available() => metal()?,
        DevicePreference::Auto => Device::Cpu,
    };
    tracing::info!(?preference, device = device_name(&device), "selected compute device");
    Ok(device)
}

fn cuda() -> Result<Device> {
    Device::new_cuda(0).map_err(|source| Error::Device {
        device: "cuda",
        source,
    })
}

fn metal() -> Result<Device> {
    Device::new_metal(0).map_err(|source| Error::Device {
        device: "metal",
        source,
    })
}

pub fn device_name(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}
