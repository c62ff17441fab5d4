//! Byte-wide access to I/O ports.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Default path of the kernel's port I/O device.
pub const DEV_PORT: &str = "/dev/port";

/// Single-byte port input and output.
///
/// This is the seam between the EC handshake and the hardware. The
/// production implementation is [`DevPort`]; tests substitute a simulated
/// controller.
pub trait PortIo {
    fn inb(&mut self, port: u16) -> io::Result<u8>;
    fn outb(&mut self, port: u16, value: u8) -> io::Result<()>;
}

/// Port I/O through `/dev/port`, where the file offset is the port number.
///
/// Opening the device needs root (`CAP_SYS_RAWIO`). Access is acquired once
/// and held for the life of the process.
#[derive(Debug)]
pub struct DevPort {
    file: File,
    path: PathBuf,
}

impl DevPort {
    /// Open the port device, mapping a refusal to [`Error::Permission`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                io::ErrorKind::PermissionDenied => Error::Permission {
                    path: path.clone(),
                    source,
                },
                _ => Error::Io(source),
            })?;
        debug!(path = %path.display(), "Acquired port I/O access");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PortIo for DevPort {
    fn inb(&mut self, port: u16) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.file.read_exact_at(&mut buf, u64::from(port))?;
        Ok(buf[0])
    }

    fn outb(&mut self, port: u16, value: u8) -> io::Result<()> {
        self.file.write_all_at(&[value], u64::from(port))
    }
}
