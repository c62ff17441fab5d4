//! In-memory EC that follows the port handshake, for tests.

use std::io;

use super::port::PortIo;
use super::registers::{Fan, BANK_SIZE, CMD_READ, CMD_SET_FAN_DUTY, EC_DATA, EC_SC};
use super::EcStatus;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    ReadAddress,
    WriteAddress(u8),
    WriteValue(u8, u8),
}

pub(crate) struct SimulatedEc {
    pub registers: [u8; BANK_SIZE],
    /// Completed three-byte commands, in order.
    pub commands: Vec<(u8, u8, u8)>,
    /// Status byte reported forever, ignoring the state machine.
    pub stuck_status: Option<u8>,
    /// Never raise OBF after a read command.
    pub never_fill_output: bool,
    /// Polls reporting IBF after each byte written.
    pub busy_polls: usize,
    pub status_polls: usize,
    state: State,
    output: Option<u8>,
    busy_remaining: usize,
}

impl Default for SimulatedEc {
    fn default() -> Self {
        Self {
            registers: [0; BANK_SIZE],
            commands: Vec::new(),
            stuck_status: None,
            never_fill_output: false,
            busy_polls: 0,
            status_polls: 0,
            state: State::Idle,
            output: None,
            busy_remaining: 0,
        }
    }
}

impl SimulatedEc {
    /// An EC whose status port always reads `status`.
    pub fn stuck(status: u8) -> Self {
        Self {
            stuck_status: Some(status),
            ..Self::default()
        }
    }

    /// An EC that reports IBF for `polls` status reads after every write.
    pub fn busy(polls: usize) -> Self {
        Self {
            busy_polls: polls,
            ..Self::default()
        }
    }

    /// An EC that accepts read commands but never raises OBF.
    pub fn never_filling() -> Self {
        Self {
            never_fill_output: true,
            ..Self::default()
        }
    }

    /// Raw values of every fan duty command, in order.
    pub fn fan_writes(&self) -> Vec<u8> {
        self.commands
            .iter()
            .filter(|(cmd, _, _)| *cmd == CMD_SET_FAN_DUTY)
            .map(|(_, _, value)| *value)
            .collect()
    }

    fn status(&mut self) -> u8 {
        let mut status = EcStatus::empty();
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            status |= EcStatus::IBF;
        }
        if self.output.is_some() && !self.never_fill_output {
            status |= EcStatus::OBF;
        }
        status.bits()
    }
}

impl PortIo for SimulatedEc {
    fn inb(&mut self, port: u16) -> io::Result<u8> {
        match port {
            EC_SC => {
                self.status_polls += 1;
                Ok(self.stuck_status.unwrap_or_else(|| self.status()))
            }
            EC_DATA => Ok(self.output.take().unwrap_or(0)),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "unknown port")),
        }
    }

    fn outb(&mut self, port: u16, value: u8) -> io::Result<()> {
        self.busy_remaining = self.busy_polls;
        match (port, self.state) {
            (EC_SC, _) if value == CMD_READ => self.state = State::ReadAddress,
            (EC_SC, _) => self.state = State::WriteAddress(value),
            (EC_DATA, State::ReadAddress) => {
                self.output = Some(self.registers[value as usize]);
                self.state = State::Idle;
            }
            (EC_DATA, State::WriteAddress(cmd)) => self.state = State::WriteValue(cmd, value),
            (EC_DATA, State::WriteValue(cmd, addr)) => {
                self.commands.push((cmd, addr, value));
                if cmd == CMD_SET_FAN_DUTY {
                    if let Some(fan) = Fan::ALL.into_iter().find(|f| f.channel() == addr) {
                        self.registers[fan.duty_register() as usize] = value;
                    }
                }
                self.state = State::Idle;
            }
            (EC_DATA, State::Idle) => {}
            _ => return Err(io::Error::new(io::ErrorKind::InvalidInput, "unknown port")),
        }
        Ok(())
    }
}
