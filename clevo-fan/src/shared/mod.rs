//! State shared between the worker and control processes.
//!
//! The record lives in one page of anonymous shared memory mapped before the
//! worker is forked, so both processes see the same bytes. There is no lock.
//! Every field is an independent atomic scalar with exactly one writing
//! process, and each process only gets the view that can write its own
//! fields:
//!
//! | Field | Writer |
//! |---|---|
//! | termination flag, auto mode, requested manual duty | control |
//! | readings, applied auto duty, applied manual duty | worker |
//!
//! Readers may see a value up to one sampling interval old. Fields are not
//! updated together, so a snapshot may mix readings from adjacent ticks.

mod view;

pub use view::{ControlView, SensorSnapshot, WorkerView};

use std::io;
use std::mem;
use std::num::NonZeroUsize;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8};

use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};

use crate::error::Result;
use crate::tracing::prelude::*;

/// Stored in the applied-auto-duty field when nothing has been applied since
/// entering auto mode. Outside the valid duty range.
const DUTY_UNSET: u8 = 0xFF;

const REGION_SIZE: usize = 4096;

const _: () = assert!(mem::size_of::<SharedRecord>() <= REGION_SIZE);

#[repr(C)]
pub(crate) struct SharedRecord {
    exit: AtomicBool,
    auto_mode: AtomicBool,
    cpu_temp_c: AtomicU8,
    gpu_temp_c: [AtomicU8; 2],
    cpu_duty: AtomicU8,
    gpu_duty: AtomicU8,
    applied_auto_duty: AtomicU8,
    /// Zero means no pending request.
    requested_manual_duty: AtomicU8,
    applied_manual_duty: AtomicU8,
    fan_rpm: [AtomicU32; 2],
}

impl SharedRecord {
    const fn new() -> Self {
        Self {
            exit: AtomicBool::new(false),
            auto_mode: AtomicBool::new(true),
            cpu_temp_c: AtomicU8::new(0),
            gpu_temp_c: [AtomicU8::new(0), AtomicU8::new(0)],
            cpu_duty: AtomicU8::new(0),
            gpu_duty: AtomicU8::new(0),
            applied_auto_duty: AtomicU8::new(DUTY_UNSET),
            requested_manual_duty: AtomicU8::new(0),
            applied_manual_duty: AtomicU8::new(0),
            fan_rpm: [AtomicU32::new(0), AtomicU32::new(0)],
        }
    }
}

/// Owner of the shared mapping.
///
/// The control process owns the region. It is unmapped on drop, which the
/// supervisor only lets happen after the worker has been told to exit and
/// has been reaped. A forked worker inherits its own copy of this value and
/// unmapping there only affects the worker's address space.
pub struct SharedRegion {
    record: NonNull<SharedRecord>,
    len: NonZeroUsize,
}

// SAFETY: the mapping is only accessed through atomics, and the pointer stays
// valid until drop.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Map a fresh, initialised record. Call before forking the worker.
    pub fn new() -> Result<Self> {
        let len = NonZeroUsize::new(REGION_SIZE).ok_or_else(|| io::Error::other("empty region"))?;

        // SAFETY: a new anonymous mapping aliases nothing; it is page
        // aligned, which satisfies SharedRecord's alignment, and large enough
        // per the assertion above.
        let record = unsafe {
            let addr = mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
            )
            .map_err(io::Error::from)?;
            let record = addr.cast::<SharedRecord>();
            record.as_ptr().write(SharedRecord::new());
            record
        };

        debug!(size = REGION_SIZE, "Mapped shared state region");
        Ok(Self { record, len })
    }

    /// The view for the sampling/actuation process.
    pub fn worker_view(&self) -> WorkerView<'_> {
        WorkerView::new(self.record())
    }

    /// The view for the control/display process.
    pub fn control_view(&self) -> ControlView<'_> {
        ControlView::new(self.record())
    }

    fn record(&self) -> &SharedRecord {
        // SAFETY: initialised in `new` and mapped until `drop`.
        unsafe { self.record.as_ref() }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        // SAFETY: views borrow `self`, so none outlive the mapping.
        let result = unsafe { munmap(self.record.cast(), self.len.get()) };
        match result {
            Ok(()) => debug!("Released shared state region"),
            Err(e) => warn!(error = %e, "Failed to unmap shared state region"),
        }
    }
}
