//! EC port numbers, command bytes and register map.
//!
//! The register offsets apply both to single reads through the port
//! handshake and to the 256-byte bank exposed by the `ec_sys` debugfs dump.
//! Nothing outside this crate addresses registers by number.

use strum::Display;

/// Data port.
pub const EC_DATA: u16 = 0x62;
/// Status (read) and command (write) port.
pub const EC_SC: u16 = 0x66;

/// Read-register command, written to [`EC_SC`].
pub const CMD_READ: u8 = 0x80;
/// Set-fan-duty command, written to [`EC_SC`].
pub const CMD_SET_FAN_DUTY: u8 = 0x99;

/// Size of the register bank.
pub const BANK_SIZE: usize = 0x100;

pub const REG_CPU_TEMP: u8 = 0x07;
pub const REG_CPU_FAN_DUTY: u8 = 0xCE;
pub const REG_GPU_FAN_DUTY: u8 = 0xCF;
pub const REG_FAN_1_RPM_HI: u8 = 0xD0;
pub const REG_FAN_1_RPM_LO: u8 = 0xD1;
pub const REG_FAN_2_RPM_HI: u8 = 0xD2;
pub const REG_FAN_2_RPM_LO: u8 = 0xD3;

/// A physical fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Fan {
    /// Fan 1, cooling the CPU.
    Cpu,
    /// Fan 2, cooling the GPU.
    Gpu,
}

impl Fan {
    pub const ALL: [Fan; 2] = [Fan::Cpu, Fan::Gpu];

    /// Channel id passed with [`CMD_SET_FAN_DUTY`].
    pub const fn channel(self) -> u8 {
        match self {
            Fan::Cpu => 0x01,
            Fan::Gpu => 0x02,
        }
    }

    /// Register holding this fan's raw PWM duty.
    pub const fn duty_register(self) -> u8 {
        match self {
            Fan::Cpu => REG_CPU_FAN_DUTY,
            Fan::Gpu => REG_GPU_FAN_DUTY,
        }
    }

    /// High and low byte registers of this fan's tachometer period.
    pub const fn tach_registers(self) -> (u8, u8) {
        match self {
            Fan::Cpu => (REG_FAN_1_RPM_HI, REG_FAN_1_RPM_LO),
            Fan::Gpu => (REG_FAN_2_RPM_HI, REG_FAN_2_RPM_LO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_name_fans_in_lowercase() {
        assert_eq!(Fan::Cpu.to_string(), "cpu");
        assert_eq!(Fan::Gpu.to_string(), "gpu");
    }
}
