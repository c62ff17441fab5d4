//! The control/display surface.
//!
//! Runs in the unprivileged process. It only reads readings from the shared
//! store and writes mode and manual duty requests into it; it never talks to
//! the EC.

mod console;

pub use console::{Console, ConsoleExit};

use std::fmt;
use std::str::FromStr;

use crate::duty::Duty;
use crate::error::Error;
use crate::shared::{ControlView, SensorSnapshot};

/// Fan speed treated as 100 % load for display.
pub const MAX_FAN_RPM: u32 = 4400;

/// An operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Auto,
    Manual(Duty),
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "auto" | "a" => Ok(Command::Auto),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => match other.parse::<i64>() {
                // Zero hands the fans back to the auto controller.
                Ok(0) => Ok(Command::Auto),
                Ok(percent) => Duty::try_from(percent).map(Command::Manual),
                Err(_) => Err(Error::Other(format!(
                    "unknown command {s:?}, expected a duty percentage, \"auto\" or \"quit\""
                ))),
            },
        }
    }
}

impl Command {
    /// Write the command into the store. `Quit` is handled by the caller.
    pub fn apply(self, view: &ControlView<'_>) {
        match self {
            Command::Auto => view.select_auto(),
            Command::Manual(duty) => view.select_manual(duty),
            Command::Quit => {}
        }
    }
}

/// Fan load rounded to the nearest 5 %, capped at 100.
pub fn fan_load_percent(rpm: u32) -> u8 {
    let load = f64::from(rpm) / f64::from(MAX_FAN_RPM) * 100.0;
    let rounded = (load / 5.0).round() * 5.0;
    rounded.min(100.0) as u8
}

/// One-line summary of a snapshot.
pub struct StatusLine(pub SensorSnapshot);

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        write!(
            f,
            "CPU: {}℃ GPU: {}℃ {}℃ | fans {}/{} RPM ({}%) | duty {}/{} | ",
            s.cpu_temp_c,
            s.gpu_temp_c[0],
            s.gpu_temp_c[1],
            s.fan_rpm[0],
            s.fan_rpm[1],
            fan_load_percent(s.fan_rpm[0]),
            s.cpu_duty,
            s.gpu_duty,
        )?;
        match (s.auto_mode, s.applied_auto_duty, s.requested_manual_duty) {
            (true, Some(duty), _) => write!(f, "auto {duty}"),
            (true, None, _) => write!(f, "auto"),
            (false, _, Some(duty)) => write!(f, "manual {duty}"),
            (false, _, None) => write!(f, "manual"),
        }
    }
}
