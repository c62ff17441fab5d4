//! Crate-wide error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ec::EcError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Privileged port access was refused. Fatal at startup.
    #[error("permission denied opening {path}: {source}")]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An EC handshake failed; the single operation is discarded.
    #[error(transparent)]
    Ec(#[from] EcError),

    /// The bulk register dump could not be opened or read.
    #[error("telemetry source {path} unavailable: {source}")]
    TelemetrySource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("short read from telemetry source: got {len} of {expected} bytes")]
    ShortRead { len: usize, expected: usize },

    /// A duty request outside 0..=100.
    #[error("invalid fan duty {0}, expected a percentage between 0 and 100")]
    Argument(i64),

    /// GPU telemetry query failed. Treated as "no new data".
    #[error("GPU telemetry: {0}")]
    Gpu(String),

    #[error("unable to create worker process: {0}")]
    Spawn(#[source] nix::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<nvml_wrapper::error::NvmlError> for Error {
    fn from(err: nvml_wrapper::error::NvmlError) -> Self {
        Error::Gpu(err.to_string())
    }
}
