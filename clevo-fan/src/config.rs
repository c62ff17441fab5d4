//! Runtime configuration.

use std::path::PathBuf;

use crate::ec::port::DEV_PORT;
use crate::telemetry::DEFAULT_BANK_PATH;
use crate::thermal::ThermalConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Register bank dump read by the worker every tick.
    pub bank_path: PathBuf,

    /// Port I/O device used for the EC handshake.
    pub port_path: PathBuf,

    pub thermal: ThermalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bank_path: PathBuf::from(DEFAULT_BANK_PATH),
            port_path: PathBuf::from(DEV_PORT),
            thermal: ThermalConfig::default(),
        }
    }
}
