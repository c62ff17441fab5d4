use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::AtomicU8;

use serde::Serialize;

use super::{SharedRecord, DUTY_UNSET};
use crate::duty::Duty;
use crate::telemetry::EcReadings;

/// Point-in-time copy of the record, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorSnapshot {
    pub cpu_temp_c: u8,
    pub gpu_temp_c: [u8; 2],
    pub cpu_duty: Duty,
    pub gpu_duty: Duty,
    pub fan_rpm: [u32; 2],
    pub auto_mode: bool,
    pub applied_auto_duty: Option<Duty>,
    pub requested_manual_duty: Option<Duty>,
}

fn load_duty(field: &AtomicU8) -> Option<Duty> {
    Duty::new(field.load(Relaxed))
}

fn store_duty(field: &AtomicU8, duty: Option<Duty>, none: u8) {
    field.store(duty.map_or(none, Duty::percent), Relaxed);
}

/// Zero is "nothing requested" / "nothing applied".
fn load_nonzero_duty(field: &AtomicU8) -> Option<Duty> {
    load_duty(field).filter(|duty| *duty != Duty::MIN)
}

fn snapshot(record: &SharedRecord) -> SensorSnapshot {
    SensorSnapshot {
        cpu_temp_c: record.cpu_temp_c.load(Relaxed),
        gpu_temp_c: [
            record.gpu_temp_c[0].load(Relaxed),
            record.gpu_temp_c[1].load(Relaxed),
        ],
        cpu_duty: load_duty(&record.cpu_duty).unwrap_or(Duty::MIN),
        gpu_duty: load_duty(&record.gpu_duty).unwrap_or(Duty::MIN),
        fan_rpm: [
            record.fan_rpm[0].load(Relaxed),
            record.fan_rpm[1].load(Relaxed),
        ],
        auto_mode: record.auto_mode.load(Relaxed),
        applied_auto_duty: load_duty(&record.applied_auto_duty),
        requested_manual_duty: load_nonzero_duty(&record.requested_manual_duty),
    }
}

/// Worker side: writes readings and applied duties.
#[derive(Clone, Copy)]
pub struct WorkerView<'a> {
    record: &'a SharedRecord,
}

impl<'a> WorkerView<'a> {
    pub(super) fn new(record: &'a SharedRecord) -> Self {
        Self { record }
    }

    pub fn exit_requested(&self) -> bool {
        self.record.exit.load(Relaxed)
    }

    pub fn auto_mode(&self) -> bool {
        self.record.auto_mode.load(Relaxed)
    }

    /// Pending manual duty, if any.
    pub fn requested_manual_duty(&self) -> Option<Duty> {
        load_nonzero_duty(&self.record.requested_manual_duty)
    }

    pub fn applied_manual_duty(&self) -> Option<Duty> {
        load_nonzero_duty(&self.record.applied_manual_duty)
    }

    pub fn set_applied_manual_duty(&self, duty: Option<Duty>) {
        store_duty(&self.record.applied_manual_duty, duty, 0);
    }

    /// Last duty applied by the auto controller, `None` when unset.
    pub fn applied_auto_duty(&self) -> Option<Duty> {
        load_duty(&self.record.applied_auto_duty)
    }

    pub fn set_applied_auto_duty(&self, duty: Option<Duty>) {
        store_duty(&self.record.applied_auto_duty, duty, DUTY_UNSET);
    }

    pub fn publish_readings(&self, readings: &EcReadings) {
        let record = self.record;
        record.cpu_temp_c.store(readings.cpu_temp_c, Relaxed);
        record.cpu_duty.store(readings.cpu_duty.percent(), Relaxed);
        record.gpu_duty.store(readings.gpu_duty.percent(), Relaxed);
        for (field, rpm) in record.fan_rpm.iter().zip(readings.fan_rpm) {
            field.store(rpm, Relaxed);
        }
    }

    /// Store a GPU temperature. Slots beyond the second GPU are ignored.
    pub fn publish_gpu_temp(&self, slot: usize, temp_c: u8) {
        if let Some(field) = self.record.gpu_temp_c.get(slot) {
            field.store(temp_c, Relaxed);
        }
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        snapshot(self.record)
    }
}

/// Control side: writes the termination flag, mode and manual requests.
#[derive(Clone, Copy)]
pub struct ControlView<'a> {
    record: &'a SharedRecord,
}

impl<'a> ControlView<'a> {
    pub(super) fn new(record: &'a SharedRecord) -> Self {
        Self { record }
    }

    /// Ask the worker to stop at its next tick.
    pub fn request_exit(&self) {
        self.record.exit.store(true, Relaxed);
    }

    pub fn exit_requested(&self) -> bool {
        self.record.exit.load(Relaxed)
    }

    /// Hand the fans back to the auto controller.
    pub fn select_auto(&self) {
        self.record.requested_manual_duty.store(0, Relaxed);
        self.record.auto_mode.store(true, Relaxed);
    }

    /// Leave auto mode and request a fixed duty.
    ///
    /// A request of 0 % is indistinguishable from no request: auto mode is
    /// switched off and the fans keep their current duty.
    pub fn select_manual(&self, duty: Duty) {
        self.record.auto_mode.store(false, Relaxed);
        self.record
            .requested_manual_duty
            .store(duty.percent(), Relaxed);
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        snapshot(self.record)
    }
}
