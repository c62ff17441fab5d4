//! Decoding EC telemetry.
//!
//! Raw register bytes become temperatures, duty percentages and fan speeds
//! here. The conversions are pure; capturing the bytes is the job of
//! [`BankSource`].

mod bank;

pub use bank::{load_ec_sys, BankSource, RegisterBank, SysfsBank, DEFAULT_BANK_PATH};

use serde::Serialize;

use crate::duty::Duty;

/// Tachometer calibration: RPM = `RPM_CALIBRATION / period`.
pub const RPM_CALIBRATION: u32 = 2_156_220;

/// Duty percentage encoded by a raw PWM value, rounded down.
pub fn decode_duty(raw: u8) -> Duty {
    Duty::from_raw(raw)
}

/// Fan speed from a 16-bit tachometer period split across two registers.
///
/// A zero period means the fan is stopped (or not reporting) and decodes to
/// zero rather than dividing by it.
pub fn decode_rpm(hi: u8, lo: u8) -> u32 {
    let period = u32::from(u16::from_be_bytes([hi, lo]));
    if period == 0 {
        0
    } else {
        RPM_CALIBRATION / period
    }
}

/// Decoded readings from one register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EcReadings {
    pub cpu_temp_c: u8,
    pub cpu_duty: Duty,
    pub gpu_duty: Duty,
    /// CPU fan then GPU fan.
    pub fan_rpm: [u32; 2],
}
