//! GPU temperature telemetry.
//!
//! The EC only reports the CPU temperature reliably, so discrete GPU
//! temperatures come from the vendor library. Queries are best effort: a
//! failed query leaves the previously stored temperature in place.

mod nvml;

pub use nvml::NvmlTelemetry;

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Number of GPU temperature slots in the shared record.
pub const MAX_GPUS: usize = 2;

/// An enumerated GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDevice {
    pub index: u32,
    pub name: String,
}

pub trait GpuTelemetry {
    fn devices(&self) -> &[GpuDevice];

    /// Current core temperature of the `slot`-th enumerated device, in °C.
    fn temperature(&self, slot: usize) -> Result<u8>;
}

/// Stand-in when no GPU telemetry is available. Reports no devices.
#[derive(Debug, Default)]
pub struct NoGpus;

impl GpuTelemetry for NoGpus {
    fn devices(&self) -> &[GpuDevice] {
        &[]
    }

    fn temperature(&self, slot: usize) -> Result<u8> {
        Err(Error::Gpu(format!("no GPU in slot {slot}")))
    }
}

/// Acquire GPU telemetry, falling back to [`NoGpus`].
///
/// A machine without the vendor driver still gets CPU-driven fan control, so
/// initialisation failure is logged rather than fatal.
pub fn acquire() -> Box<dyn GpuTelemetry> {
    match NvmlTelemetry::acquire() {
        Ok(telemetry) => {
            for device in telemetry.devices() {
                info!(index = device.index, name = %device.name, "Found GPU");
            }
            Box::new(telemetry)
        }
        Err(e) => {
            warn!(error = %e, "GPU telemetry unavailable, continuing with CPU temperature only");
            Box::new(NoGpus)
        }
    }
}
