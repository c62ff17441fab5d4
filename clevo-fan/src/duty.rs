//! Fan duty percentage.

use std::fmt;

use serde::Serialize;

use crate::error::Error;

/// A fan duty cycle in percent, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Duty(u8);

impl Duty {
    pub const MIN: Duty = Duty(0);
    pub const MAX: Duty = Duty(100);

    /// Returns `None` when `percent` exceeds 100.
    pub const fn new(percent: u8) -> Option<Self> {
        if percent <= 100 {
            Some(Duty(percent))
        } else {
            None
        }
    }

    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Raw PWM register value, `floor(percent * 255 / 100)`.
    pub const fn to_raw(self) -> u8 {
        (self.0 as u16 * 255 / 100) as u8
    }

    /// Duty encoded by a raw PWM register value, `floor(raw * 100 / 255)`.
    ///
    /// The conversion is lossy: `Duty::from_raw(d.to_raw())` may land one
    /// percentage point below `d`.
    pub const fn from_raw(raw: u8) -> Self {
        Duty((raw as u16 * 100 / 255) as u8)
    }
}

impl TryFrom<i64> for Duty {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Duty::new)
            .ok_or(Error::Argument(value))
    }
}

impl fmt::Display for Duty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, 0)]
    #[test_case(40, 102)]
    #[test_case(50, 127)]
    #[test_case(100, 255)]
    fn should_encode_to_raw_pwm(percent: u8, raw: u8) {
        assert_eq!(Duty::new(percent).unwrap().to_raw(), raw);
    }

    #[test]
    fn should_lose_at_most_one_point_on_round_trip() {
        for percent in 0..=100 {
            let duty = Duty::new(percent).unwrap();
            let back = Duty::from_raw(duty.to_raw());
            assert!(back <= duty);
            assert!(duty.percent() - back.percent() <= 1, "{duty} came back as {back}");
        }
    }

    #[test]
    fn should_document_lossy_fifty_percent() {
        let raw = Duty::new(50).unwrap().to_raw();
        assert_eq!(raw, 127);
        assert_eq!(Duty::from_raw(raw).percent(), 49);
    }

    #[test_case(-1; "negative")]
    #[test_case(101; "just above range")]
    #[test_case(1000; "far above range")]
    fn should_reject_out_of_range(value: i64) {
        assert!(matches!(Duty::try_from(value), Err(Error::Argument(v)) if v == value));
    }

    #[test]
    fn should_accept_range_bounds() {
        assert_eq!(Duty::try_from(0).unwrap(), Duty::MIN);
        assert_eq!(Duty::try_from(100).unwrap(), Duty::MAX);
    }
}
