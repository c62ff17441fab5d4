use std::time::Duration;

use crate::duty::Duty;

#[derive(Debug, Clone)]
pub struct ThermalConfig {
    /// Lower edge of the ramp band (°C). The logistic curve is centred on
    /// the middle of the band and its steepness follows the band width.
    pub band_low_c: f64,

    /// Upper edge of the ramp band (°C). Must differ from `band_low_c`.
    pub band_high_c: f64,

    /// Duty never commanded below this once auto control is active, so the
    /// fans do not stall.
    pub min_duty: Duty,

    /// Auto duty is rounded up to a multiple of this many percent. Fans
    /// respond in coarse steps anyway.
    pub duty_step: u8,

    /// Sampling interval while steady or heating up.
    pub nominal_interval: Duration,

    /// Sampling interval after stepping the duty down, to keep the fans from
    /// hunting while the system cools.
    pub cooldown_interval: Duration,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            band_low_c: 50.0,
            band_high_c: 60.0,
            min_duty: Duty::new(40).unwrap_or(Duty::MIN),
            duty_step: 10,
            nominal_interval: Duration::from_millis(200),
            cooldown_interval: Duration::from_secs(8),
        }
    }
}
