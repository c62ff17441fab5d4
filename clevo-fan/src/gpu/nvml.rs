use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::Nvml;

use super::{GpuDevice, GpuTelemetry};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// GPU telemetry through NVML.
///
/// Holds the library handle for the life of the worker; dropping it shuts
/// NVML down. Device handles are looked up by index per query rather than
/// kept, since they borrow the library handle.
pub struct NvmlTelemetry {
    nvml: Nvml,
    devices: Vec<GpuDevice>,
}

impl NvmlTelemetry {
    pub fn acquire() -> Result<Self> {
        let nvml = Nvml::init()?;
        let count = nvml.device_count()?;

        let mut devices = Vec::with_capacity(count as usize);
        for index in 0..count {
            let name = match nvml.device_by_index(index).and_then(|d| d.name()) {
                Ok(name) => name,
                Err(e) => {
                    warn!(index, error = %e, "Unable to query GPU name");
                    format!("GPU {index}")
                }
            };
            devices.push(GpuDevice { index, name });
        }

        Ok(Self { nvml, devices })
    }
}

impl GpuTelemetry for NvmlTelemetry {
    fn devices(&self) -> &[GpuDevice] {
        &self.devices
    }

    fn temperature(&self, slot: usize) -> Result<u8> {
        let device = self
            .devices
            .get(slot)
            .ok_or_else(|| Error::Gpu(format!("no GPU in slot {slot}")))?;
        let temp = self
            .nvml
            .device_by_index(device.index)?
            .temperature(TemperatureSensor::Gpu)?;
        Ok(u8::try_from(temp).unwrap_or(u8::MAX))
    }
}

impl Drop for NvmlTelemetry {
    fn drop(&mut self) {
        debug!(devices = self.devices.len(), "Releasing GPU telemetry");
    }
}
