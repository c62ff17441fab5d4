//! The sampling/actuation worker.
//!
//! Runs in the privileged process and is the only code that touches the EC.
//! Each tick captures the register bank, applies any manual request,
//! publishes readings to the shared store, and runs the auto-duty controller
//! when auto mode is selected.
//!
//! ```text
//!            exit flag | parent gone | signal
//!  Running ──────────────────────────────────► Exiting
//!   │  ▲
//!   └──┘ tick, sleep 200 ms (8 s after stepping down)
//! ```
//!
//! Cancellation is only observed between ticks, never inside an EC
//! handshake. Shutdown latency is bounded by the current sleep interval.

use std::time::Duration;

use nix::unistd::{getppid, Pid};
use tokio_util::sync::CancellationToken;

use crate::ec::port::PortIo;
use crate::ec::EmbeddedController;
use crate::gpu::{GpuTelemetry, MAX_GPUS};
use crate::shared::WorkerView;
use crate::telemetry::BankSource;
use crate::thermal::{control_temperature, AutoDutyController};
use crate::tracing::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The control process set the termination flag.
    Requested,
    /// The process that forked the worker is gone.
    ParentGone,
    /// A termination signal arrived.
    Signal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running { next_tick: Duration },
    Exiting(ExitReason),
}

pub struct Worker<'a, P, B> {
    ec: EmbeddedController<P>,
    bank: B,
    gpus: Box<dyn GpuTelemetry>,
    store: WorkerView<'a>,
    controller: AutoDutyController,
    parent: Option<Pid>,
    last_auto_mode: Option<bool>,
}

impl<'a, P: PortIo, B: BankSource> Worker<'a, P, B> {
    pub fn new(
        ec: EmbeddedController<P>,
        bank: B,
        gpus: Box<dyn GpuTelemetry>,
        store: WorkerView<'a>,
        controller: AutoDutyController,
    ) -> Self {
        Self {
            ec,
            bank,
            gpus,
            store,
            controller,
            parent: None,
            last_auto_mode: None,
        }
    }

    /// Exit when this process is no longer a child of `parent`.
    pub fn with_parent(mut self, parent: Pid) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Tick until told to stop. GPU telemetry is released on return.
    pub async fn run(mut self, cancellation: CancellationToken) -> ExitReason {
        info!(gpus = self.gpus.devices().len(), "Worker started");

        let reason = loop {
            if cancellation.is_cancelled() {
                break ExitReason::Signal;
            }

            let interval = match self.tick() {
                WorkerState::Running { next_tick } => next_tick,
                WorkerState::Exiting(reason) => break reason,
            };

            tokio::select! {
                _ = cancellation.cancelled() => break ExitReason::Signal,
                _ = tokio::time::sleep(interval) => {}
            }
        };

        info!(reason = ?reason, "Worker exiting");
        reason
    }

    /// One sampling/actuation pass.
    pub fn tick(&mut self) -> WorkerState {
        if self.store.exit_requested() {
            return WorkerState::Exiting(ExitReason::Requested);
        }
        if !self.parent_alive() {
            warn!(parent = ?self.parent, "Parent process gone");
            return WorkerState::Exiting(ExitReason::ParentGone);
        }

        let bank = match self.bank.capture() {
            Ok(bank) => Some(bank),
            Err(e) => {
                warn!(error = %e, "Unable to read EC register bank, keeping previous readings");
                None
            }
        };

        self.track_mode();
        self.apply_manual_request();

        if let Some(bank) = bank {
            self.store.publish_readings(&bank.decode());
        }
        self.publish_gpu_temps();

        let next_tick = if self.store.auto_mode() {
            self.adjust_auto_duty()
        } else {
            self.controller.config().nominal_interval
        };

        WorkerState::Running { next_tick }
    }

    fn parent_alive(&self) -> bool {
        self.parent.is_none_or(|parent| getppid() == parent)
    }

    /// Reset applied-duty bookkeeping on mode changes, so the first duty in
    /// each mode is always written.
    fn track_mode(&mut self) {
        let auto = self.store.auto_mode();
        match self.last_auto_mode.replace(auto) {
            Some(previous) if previous != auto => {
                self.store.set_applied_auto_duty(None);
                if auto {
                    self.store.set_applied_manual_duty(None);
                }
                info!(auto, "Fan control mode changed");
            }
            _ => {}
        }
    }

    fn apply_manual_request(&mut self) {
        let Some(requested) = self.store.requested_manual_duty() else {
            return;
        };
        if self.store.applied_manual_duty() == Some(requested) {
            return;
        }

        match self.ec.write_fan_duty(requested) {
            Ok(()) => {
                info!(duty = %requested, "Manual fan duty applied");
                self.store.set_applied_manual_duty(Some(requested));
            }
            Err(e) => warn!(duty = %requested, error = %e, "Manual fan duty write failed"),
        }
    }

    fn publish_gpu_temps(&mut self) {
        let count = self.gpus.devices().len().min(MAX_GPUS);
        for slot in 0..count {
            match self.gpus.temperature(slot) {
                Ok(temp) => self.store.publish_gpu_temp(slot, temp),
                Err(e) => debug!(slot, error = %e, "GPU temperature query failed"),
            }
        }
    }

    fn adjust_auto_duty(&mut self) -> Duration {
        let readings = self.store.snapshot();
        let temp = control_temperature(readings.cpu_temp_c, readings.gpu_temp_c);
        let decision = self.controller.decide(temp, self.store.applied_auto_duty());

        if !decision.write {
            return decision.interval;
        }

        match self.ec.write_fan_duty(decision.duty) {
            Ok(()) => {
                info!(
                    cpu_c = readings.cpu_temp_c,
                    gpu1_c = readings.gpu_temp_c[0],
                    gpu2_c = readings.gpu_temp_c[1],
                    duty = %decision.duty,
                    "Auto fan duty changed"
                );
                self.store.set_applied_auto_duty(Some(decision.duty));
                decision.interval
            }
            Err(e) => {
                warn!(duty = %decision.duty, error = %e, "Auto fan duty write failed");
                self.controller.config().nominal_interval
            }
        }
    }

    #[cfg(test)]
    fn applied_auto_duty(&self) -> Option<crate::duty::Duty> {
        self.store.applied_auto_duty()
    }
}
