//! Embedded controller register interface.
//!
//! The EC speaks a two-port handshake. Every byte written to either port must
//! wait for the input buffer (IBF) to drain, and a read result is only valid
//! once the output buffer (OBF) fills. There is no completion interrupt
//! available to us, so each wait is a bounded poll of the status port.
//!
//! ```text
//! read_register(addr)         write_sequence(cmd, addr, value)
//!   wait IBF=0, SC <- 0x80      wait IBF=0, SC   <- cmd
//!   wait IBF=0, DATA <- addr    wait IBF=0, DATA <- addr
//!   wait OBF=1, DATA -> value   wait IBF=0, DATA <- value
//!                               wait IBF=0
//! ```

#[cfg(test)]
pub(crate) mod mock;
pub mod port;
pub mod registers;

use std::io;
use std::thread;
use std::time::Duration;

use bitflags::bitflags;
use thiserror::Error;

use crate::duty::Duty;
use crate::telemetry::{decode_rpm, EcReadings};
use crate::tracing::prelude::*;
use port::PortIo;
use registers::{Fan, CMD_READ, CMD_SET_FAN_DUTY, EC_DATA, EC_SC, REG_CPU_TEMP};

/// Status polls per wait before giving up.
pub const MAX_WAIT_ATTEMPTS: u32 = 100;

/// Pause between status polls.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

bitflags! {
    /// Bits of the EC status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EcStatus: u8 {
        /// Output buffer full: a result byte is waiting on the data port.
        const OBF = 1 << 0;
        /// Input buffer full: the EC has not consumed the last byte yet.
        const IBF = 1 << 1;
    }
}

#[derive(Debug, Error)]
pub enum EcError {
    /// A status wait exhausted its attempts.
    #[error(
        "EC wait timed out on port {port:#04x}: status {observed:#04x}, \
         waiting for {flag:?}={expected}"
    )]
    Timeout {
        port: u16,
        flag: EcStatus,
        expected: bool,
        observed: u8,
    },

    #[error("EC port I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Driver for the EC command/status handshake.
///
/// All operations block the calling thread for at most
/// `MAX_WAIT_ATTEMPTS` polls per wait and cannot be cancelled midway.
pub struct EmbeddedController<P> {
    io: P,
    poll_interval: Duration,
    max_attempts: u32,
}

impl<P: PortIo> EmbeddedController<P> {
    pub fn new(io: P) -> Self {
        Self {
            io,
            poll_interval: POLL_INTERVAL,
            max_attempts: MAX_WAIT_ATTEMPTS,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    #[cfg(test)]
    pub(crate) fn port_io(&self) -> &P {
        &self.io
    }

    /// Read one register through the handshake.
    pub fn read_register(&mut self, addr: u8) -> Result<u8, EcError> {
        self.wait(EcStatus::IBF, false)?;
        self.io.outb(EC_SC, CMD_READ)?;

        self.wait(EcStatus::IBF, false)?;
        self.io.outb(EC_DATA, addr)?;

        self.wait(EcStatus::OBF, true)?;
        let value = self.io.inb(EC_DATA)?;

        trace!(addr = format_args!("{addr:#04x}"), value, "EC register read");
        Ok(value)
    }

    /// Send a three-byte command: command, address, value.
    pub fn write_sequence(&mut self, cmd: u8, addr: u8, value: u8) -> Result<(), EcError> {
        self.wait(EcStatus::IBF, false)?;
        self.io.outb(EC_SC, cmd)?;

        self.wait(EcStatus::IBF, false)?;
        self.io.outb(EC_DATA, addr)?;

        self.wait(EcStatus::IBF, false)?;
        self.io.outb(EC_DATA, value)?;

        self.wait(EcStatus::IBF, false)?;

        trace!(
            cmd = format_args!("{cmd:#04x}"),
            addr = format_args!("{addr:#04x}"),
            value,
            "EC command written"
        );
        Ok(())
    }

    /// Command both fans to `duty`.
    ///
    /// The two channels are written independently, GPU fan first. If the
    /// first write succeeds and the second fails, the fans are left split
    /// until the next successful write.
    pub fn write_fan_duty(&mut self, duty: Duty) -> Result<(), EcError> {
        let raw = duty.to_raw();
        for fan in [Fan::Gpu, Fan::Cpu] {
            self.write_sequence(CMD_SET_FAN_DUTY, fan.channel(), raw)?;
            trace!(%fan, raw, "Fan channel written");
        }
        debug!(%duty, raw, "Fan duty written");
        Ok(())
    }

    /// Query readings one register at a time.
    ///
    /// This is the slow path for one-shot commands. The worker reads the
    /// whole bank from debugfs instead.
    pub fn query_readings(&mut self) -> Result<EcReadings, EcError> {
        let cpu_temp_c = self.read_register(REG_CPU_TEMP)?;
        let cpu_duty = Duty::from_raw(self.read_register(Fan::Cpu.duty_register())?);
        let gpu_duty = Duty::from_raw(self.read_register(Fan::Gpu.duty_register())?);

        let mut fan_rpm = [0u32; 2];
        for (slot, fan) in fan_rpm.iter_mut().zip(Fan::ALL) {
            let (hi, lo) = fan.tach_registers();
            let hi = self.read_register(hi)?;
            let lo = self.read_register(lo)?;
            *slot = decode_rpm(hi, lo);
        }

        Ok(EcReadings {
            cpu_temp_c,
            cpu_duty,
            gpu_duty,
            fan_rpm,
        })
    }

    fn wait(&mut self, flag: EcStatus, expected: bool) -> Result<(), EcError> {
        let mut attempt = 1;
        loop {
            let observed = self.io.inb(EC_SC)?;
            if EcStatus::from_bits_retain(observed).contains(flag) == expected {
                return Ok(());
            }
            if attempt >= self.max_attempts {
                warn!(
                    port = format_args!("{EC_SC:#04x}"),
                    status = format_args!("{observed:#04x}"),
                    flag = ?flag,
                    expected,
                    "EC wait timed out"
                );
                return Err(EcError::Timeout {
                    port: EC_SC,
                    flag,
                    expected,
                    observed,
                });
            }
            attempt += 1;
            thread::sleep(self.poll_interval);
        }
    }
}
