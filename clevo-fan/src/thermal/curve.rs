//! The auto-duty control law.
//!
//! A logistic curve gives a smooth ramp across the configured band instead
//! of the stock firmware's late step, reaching full duty well before the
//! thermal limits.

use super::config::ThermalConfig;
use crate::duty::Duty;

/// Temperature the controller acts on: the hottest of the CPU and two GPUs.
pub fn control_temperature(cpu_c: u8, gpu_c: [u8; 2]) -> u8 {
    cpu_c.max(gpu_c[0]).max(gpu_c[1])
}

/// Unquantised duty, `100 / (1 + e^(-b (t - a)))`.
///
/// `a` is the band midpoint and `b = 2 / band width`.
pub fn logistic_duty(temp_c: f64, config: &ThermalConfig) -> f64 {
    let midpoint = (config.band_low_c + config.band_high_c) / 2.0;
    let steepness = 2.0 / (config.band_low_c - config.band_high_c).abs();
    100.0 / (1.0 + (-steepness * (temp_c - midpoint)).exp())
}

/// Quantised auto duty for a temperature.
///
/// The logistic value is truncated to a whole percent, raised to the
/// configured floor, then rounded up to the next multiple of the duty step
/// and capped at 100.
pub fn auto_duty(temp_c: u8, config: &ThermalConfig) -> Duty {
    let percent = logistic_duty(f64::from(temp_c), config) as u16;
    let floored = percent.max(u16::from(config.min_duty.percent()));
    let step = u16::from(config.duty_step.max(1));
    let quantized = floored.div_ceil(step) * step;
    u8::try_from(quantized.min(100))
        .ok()
        .and_then(Duty::new)
        .unwrap_or(Duty::MAX)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn should_centre_curve_on_band_midpoint() {
        let config = ThermalConfig::default();
        assert!((logistic_duty(55.0, &config) - 50.0).abs() < 1e-9);
        assert_eq!(auto_duty(55, &config).percent(), 50);
    }

    #[test_case(0, 40; "cold")]
    #[test_case(50, 40; "band low edge")]
    #[test_case(56, 60; "just past midpoint")]
    #[test_case(60, 80; "band high edge")]
    #[test_case(80, 100; "hot")]
    #[test_case(255, 100; "sensor maximum")]
    fn should_map_temperature_to_duty(temp: u8, percent: u8) {
        assert_eq!(auto_duty(temp, &ThermalConfig::default()).percent(), percent);
    }

    #[test]
    fn should_be_monotonic_floored_and_stepped() {
        let config = ThermalConfig::default();
        let duties: Vec<u8> = (0..=255u8).map(|t| auto_duty(t, &config).percent()).collect();

        assert!(duties.windows(2).all(|w| w[0] <= w[1]));
        assert!(duties.iter().all(|d| *d >= 40));
        assert!(duties.iter().all(|d| d % 10 == 0));
    }

    #[test]
    fn should_approach_full_duty_well_above_band() {
        let config = ThermalConfig::default();
        assert!(logistic_duty(80.0, &config) > 99.0);
    }

    #[test]
    fn should_pick_hottest_sensor() {
        assert_eq!(control_temperature(70, [65, 80]), 80);
        assert_eq!(control_temperature(70, [0, 0]), 70);
    }
}
