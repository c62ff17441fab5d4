use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{decode_duty, decode_rpm, EcReadings};
use crate::ec::registers::{Fan, BANK_SIZE, REG_CPU_TEMP};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Where the `ec_sys` module exposes the register bank.
pub const DEFAULT_BANK_PATH: &str = "/sys/kernel/debug/ec/ec0/io";

/// Immutable snapshot of all 256 EC registers.
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterBank([u8; BANK_SIZE]);

impl RegisterBank {
    pub fn new(bytes: [u8; BANK_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn cpu_temp_c(&self) -> u8 {
        self.reg(REG_CPU_TEMP)
    }

    pub fn raw_duty(&self, fan: Fan) -> u8 {
        self.reg(fan.duty_register())
    }

    pub fn tach_period(&self, fan: Fan) -> u16 {
        let (hi, lo) = fan.tach_registers();
        u16::from_be_bytes([self.reg(hi), self.reg(lo)])
    }

    pub fn decode(&self) -> EcReadings {
        let rpm = |fan: Fan| {
            let [hi, lo] = self.tach_period(fan).to_be_bytes();
            decode_rpm(hi, lo)
        };
        EcReadings {
            cpu_temp_c: self.cpu_temp_c(),
            cpu_duty: decode_duty(self.raw_duty(Fan::Cpu)),
            gpu_duty: decode_duty(self.raw_duty(Fan::Gpu)),
            fan_rpm: [rpm(Fan::Cpu), rpm(Fan::Gpu)],
        }
    }

    fn reg(&self, addr: u8) -> u8 {
        self.0[addr as usize]
    }
}

impl std::fmt::Debug for RegisterBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterBank")
            .field("cpu_temp_c", &self.cpu_temp_c())
            .field("cpu_raw_duty", &self.raw_duty(Fan::Cpu))
            .field("gpu_raw_duty", &self.raw_duty(Fan::Gpu))
            .finish_non_exhaustive()
    }
}

/// Source of whole-bank snapshots.
pub trait BankSource {
    fn capture(&mut self) -> Result<RegisterBank>;
}

/// Reads the bank from the `ec_sys` debugfs dump.
///
/// The file is opened per capture and closed before returning, so a module
/// reload between ticks is picked up.
#[derive(Debug, Clone)]
pub struct SysfsBank {
    path: PathBuf,
}

impl SysfsBank {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SysfsBank {
    fn default() -> Self {
        Self::new(DEFAULT_BANK_PATH)
    }
}

impl BankSource for SysfsBank {
    fn capture(&mut self) -> Result<RegisterBank> {
        let unavailable = |source: io::Error| Error::TelemetrySource {
            path: self.path.clone(),
            source,
        };

        let mut file = File::open(&self.path).map_err(unavailable)?;
        let mut buf = [0u8; BANK_SIZE];
        let mut len = 0;
        while len < BANK_SIZE {
            match file.read(&mut buf[len..]) {
                Ok(0) => break,
                Ok(n) => len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(unavailable(e)),
            }
        }

        if len != BANK_SIZE {
            return Err(Error::ShortRead {
                len,
                expected: BANK_SIZE,
            });
        }
        Ok(RegisterBank(buf))
    }
}

/// Ask the kernel to load `ec_sys` so the debugfs dump exists.
///
/// Failure is only logged; the worker keeps running and reports each missed
/// capture.
pub fn load_ec_sys() {
    match Command::new("modprobe").arg("ec_sys").status() {
        Ok(status) if status.success() => debug!("Loaded ec_sys kernel module"),
        Ok(status) => warn!(%status, "modprobe ec_sys failed"),
        Err(e) => warn!(error = %e, "Unable to run modprobe"),
    }
}
