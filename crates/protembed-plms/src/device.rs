use candle_core::{Device, Result};

/// Pick the best available device, preferring CUDA then Metal.
///
/// Passing `cpu = true` forces CPU even when an accelerator is present,
/// which keeps results reproducible across machines.
pub fn device(cpu: bool) -> Result<Device> {
    if cpu {
        Ok(Device::Cpu)
    } else if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0)
    } else if candle_core::utils::metal_is_available() {
        Device::new_metal(0)
    } else {
        Ok(Device::Cpu)
    }
}
