use std::time::Duration;

use super::config::ThermalConfig;
use super::curve::auto_duty;
use crate::duty::Duty;

/// Outcome of one auto-duty evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoDutyDecision {
    /// Quantised target duty.
    pub duty: Duty,
    /// Whether the target differs from what was last applied.
    pub write: bool,
    /// How long to sleep before the next tick.
    pub interval: Duration,
}

/// Closed-loop auto duty with rate limiting.
///
/// The controller itself keeps no history. The last applied duty lives in
/// the shared store, so it survives mode switches and stays visible to the
/// control process; it is passed back in on every call.
#[derive(Debug, Clone, Default)]
pub struct AutoDutyController {
    config: ThermalConfig,
}

impl AutoDutyController {
    pub fn new(config: ThermalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThermalConfig {
        &self.config
    }

    /// Evaluate the control law for `temp_c`.
    ///
    /// A write is requested only when the quantised duty differs from
    /// `last_applied`; `None` (nothing applied since entering auto mode)
    /// always writes. Stepping down stretches the next interval to the
    /// cooldown period.
    pub fn decide(&self, temp_c: u8, last_applied: Option<Duty>) -> AutoDutyDecision {
        let duty = auto_duty(temp_c, &self.config);
        let descending = last_applied.is_some_and(|last| duty < last);

        AutoDutyDecision {
            duty,
            write: last_applied != Some(duty),
            interval: if descending {
                self.config.cooldown_interval
            } else {
                self.config.nominal_interval
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duty(percent: u8) -> Duty {
        Duty::new(percent).unwrap()
    }

    #[test]
    fn should_always_apply_first_decision() {
        let controller = AutoDutyController::default();

        let decision = controller.decide(30, None);

        assert!(decision.write);
        assert_eq!(decision.duty, duty(40));
        assert_eq!(decision.interval, controller.config().nominal_interval);
    }

    #[test]
    fn should_write_once_per_distinct_value() {
        let controller = AutoDutyController::default();
        let temperatures = [55, 55, 55, 80, 80, 55, 55];

        let mut last_applied = None;
        let mut writes = Vec::new();
        for temp in temperatures {
            let decision = controller.decide(temp, last_applied);
            if decision.write {
                writes.push(decision.duty.percent());
                last_applied = Some(decision.duty);
            }
        }

        assert_eq!(writes, vec![50, 100, 50]);
    }

    #[test]
    fn should_stretch_interval_when_descending() {
        let controller = AutoDutyController::default();

        let decision = controller.decide(55, Some(duty(100)));

        assert!(decision.write);
        assert_eq!(decision.duty, duty(50));
        assert_eq!(decision.interval, controller.config().cooldown_interval);
    }

    #[test]
    fn should_keep_nominal_interval_when_rising_or_steady() {
        let controller = AutoDutyController::default();

        let rising = controller.decide(80, Some(duty(50)));
        assert_eq!(rising.interval, controller.config().nominal_interval);

        let steady = controller.decide(55, Some(duty(50)));
        assert!(!steady.write);
        assert_eq!(steady.interval, controller.config().nominal_interval);
    }

    #[test]
    fn should_raise_to_full_duty_from_ninety() {
        let controller = AutoDutyController::default();

        let decision = controller.decide(80, Some(duty(90)));

        assert_eq!(decision.duty, Duty::MAX);
        assert!(decision.write);
    }
}
