//! Process setup and teardown.
//!
//! ```text
//!  acquire ports ─► map shared region ─► fork
//!                                         ├─ child:  worker (root, EC access)
//!                                         └─ parent: drop privileges, console
//!                                                    set exit flag, reap child,
//!                                                    unmap region
//! ```
//!
//! The fork happens before any tokio runtime or other thread exists; each
//! process then builds its own current-thread runtime.

use std::io;

use futures::future::select_all;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, getpid, getuid, geteuid, setuid, ForkResult, Pid};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::control::Console;
use crate::ec::port::DevPort;
use crate::ec::EmbeddedController;
use crate::error::{Error, Result};
use crate::gpu;
use crate::shared::{ControlView, SharedRegion};
use crate::telemetry::{load_ec_sys, SysfsBank};
use crate::thermal::AutoDutyController;
use crate::tracing::prelude::*;
use crate::worker::Worker;

/// Signals that request a cooperative shutdown.
const TERMINATION_SIGNALS: [(&str, fn() -> SignalKind); 6] = [
    ("SIGHUP", SignalKind::hangup),
    ("SIGINT", SignalKind::interrupt),
    ("SIGQUIT", SignalKind::quit),
    ("SIGTERM", SignalKind::terminate),
    ("SIGUSR1", SignalKind::user_defined1),
    ("SIGUSR2", SignalKind::user_defined2),
];

/// Run the worker and console processes until the operator quits, a
/// termination signal arrives, or the worker exits.
///
/// Returns in both processes; the worker's return ends the child.
pub fn run(config: &Config) -> Result<()> {
    let port = DevPort::open(&config.port_path)?;
    let region = SharedRegion::new()?;
    let parent = getpid();

    // SAFETY: no other threads exist yet, so the child starts from a
    // consistent copy of this process.
    match unsafe { fork() }.map_err(Error::Spawn)? {
        ForkResult::Child => run_worker(config, port, &region, parent),
        ForkResult::Parent { child } => {
            drop(port);
            info!(worker = %child, "Worker process started");
            let result = run_control(&region, child);
            drop(region);
            result
        }
    }
}

fn run_worker(config: &Config, port: DevPort, region: &SharedRegion, parent: Pid) -> Result<()> {
    load_ec_sys();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let cancellation = CancellationToken::new();
        tokio::spawn(cancel_on_signal(cancellation.clone()));

        let worker = Worker::new(
            EmbeddedController::new(port),
            SysfsBank::new(&config.bank_path),
            gpu::acquire(),
            region.worker_view(),
            AutoDutyController::new(config.thermal.clone()),
        )
        .with_parent(parent);

        worker.run(cancellation).await
    });

    Ok(())
}

fn run_control(region: &SharedRegion, child: Pid) -> Result<()> {
    let control = region.control_view();
    let mut worker = WorkerProcess::new(control, child);

    drop_privileges()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let cancellation = CancellationToken::new();
        tokio::spawn(cancel_on_signal(cancellation.clone()));

        let mut reaped = tokio::task::spawn_blocking(move || waitpid(child, None));
        let console = Console::new(control);
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());

        let early_exit = tokio::select! {
            exit = console.run(stdin, cancellation.clone()) => {
                debug!(exit = ?exit, "Console stopped");
                None
            }
            joined = &mut reaped => Some(joined),
        };

        control.request_exit();
        let joined = match early_exit {
            Some(joined) => {
                warn!("Worker process exited unexpectedly");
                joined
            }
            None => reaped.await,
        };

        match joined {
            Ok(Ok(status)) => worker.reaped(status),
            Ok(Err(errno)) => Err(Error::Io(io::Error::from(errno))),
            Err(e) => Err(Error::Other(format!("worker wait task failed: {e}"))),
        }
    });

    // Stdin is read on a blocking thread that cannot be interrupted; do not
    // wait for it.
    runtime.shutdown_background();
    result
}

/// The forked worker, seen from the control process.
///
/// Dropping a handle whose worker has not been reaped sets the termination
/// flag and blocks until the worker exits. Every return path out of the
/// control process therefore stops the worker before the shared region can
/// be unmapped.
struct WorkerProcess<'a> {
    control: ControlView<'a>,
    pid: Pid,
    reaped: bool,
}

impl<'a> WorkerProcess<'a> {
    fn new(control: ControlView<'a>, pid: Pid) -> Self {
        Self {
            control,
            pid,
            reaped: false,
        }
    }

    /// Record the status collected by `waitpid`.
    fn reaped(&mut self, status: WaitStatus) -> Result<()> {
        self.reaped = true;
        check_worker_status(status)
    }
}

impl Drop for WorkerProcess<'_> {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        self.control.request_exit();
        match waitpid(self.pid, None) {
            Ok(status) => {
                let _ = check_worker_status(status);
            }
            Err(e) => warn!(worker = %self.pid, error = %e, "Unable to reap worker process"),
        }
    }
}

/// Log the worker's exit and turn anything but a clean exit into an error.
fn check_worker_status(status: WaitStatus) -> Result<()> {
    match status {
        WaitStatus::Exited(pid, 0) => {
            info!(worker = %pid, "Worker process stopped");
            Ok(())
        }
        WaitStatus::Exited(pid, code) => {
            warn!(worker = %pid, code, "Worker process failed");
            Err(Error::Other(format!("worker process exited with status {code}")))
        }
        WaitStatus::Signaled(pid, signal, _) => {
            warn!(worker = %pid, signal = %signal, "Worker process killed");
            Err(Error::Other(format!("worker process killed by {signal}")))
        }
        other => {
            debug!(status = ?other, "Worker process status");
            Ok(())
        }
    }
}

/// Give up root in the control process when running set-uid.
fn drop_privileges() -> Result<()> {
    let uid = getuid();
    if geteuid().is_root() && !uid.is_root() {
        setuid(uid).map_err(io::Error::from)?;
        debug!(uid = %uid, "Dropped privileges");
    }
    Ok(())
}

/// Cancel `cancellation` when any termination signal arrives.
///
/// Only the token is touched here; the loops that own hardware or shared
/// state observe it at their own boundaries.
pub async fn cancel_on_signal(cancellation: CancellationToken) {
    let mut streams = Vec::with_capacity(TERMINATION_SIGNALS.len());
    for (name, kind) in TERMINATION_SIGNALS {
        match signal(kind()) {
            Ok(stream) => streams.push((name, stream)),
            Err(e) => warn!(signal = name, error = %e, "Unable to install signal handler"),
        }
    }
    if streams.is_empty() {
        return;
    }

    let (name, _, _) = select_all(streams.iter_mut().map(|(name, stream)| {
        Box::pin(async move {
            stream.recv().await;
            *name
        })
    }))
    .await;

    info!(signal = name, "Termination signal received");
    cancellation.cancel();
}

#[cfg(test)]
mod tests {
    use std::process::Command;
    use std::time::Duration;

    use nix::errno::Errno;
    use nix::sys::signal::Signal;
    use nix::sys::wait::WaitPidFlag;

    use super::*;

    #[test]
    fn should_stop_and_reap_unreaped_worker_on_drop() {
        let region = SharedRegion::new().unwrap();
        let child = Command::new("true").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);

        drop(WorkerProcess::new(region.control_view(), pid));

        assert!(region.control_view().exit_requested());
        assert_eq!(waitpid(pid, Some(WaitPidFlag::WNOHANG)), Err(Errno::ECHILD));
    }

    #[test]
    fn should_leave_reaped_worker_alone_on_drop() {
        let region = SharedRegion::new().unwrap();
        let pid = Pid::from_raw(i32::MAX);

        let mut worker = WorkerProcess::new(region.control_view(), pid);
        worker.reaped(WaitStatus::Exited(pid, 0)).unwrap();
        drop(worker);

        assert!(!region.control_view().exit_requested());
    }

    #[test]
    fn should_fail_when_worker_does_not_exit_cleanly() {
        let pid = Pid::from_raw(1234);

        assert!(check_worker_status(WaitStatus::Exited(pid, 0)).is_ok());
        assert!(matches!(
            check_worker_status(WaitStatus::Exited(pid, 1)),
            Err(Error::Other(_))
        ));
        assert!(matches!(
            check_worker_status(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            Err(Error::Other(_))
        ));
    }

    #[tokio::test]
    async fn should_cancel_on_termination_signal() {
        let cancellation = CancellationToken::new();
        let listener = tokio::spawn(cancel_on_signal(cancellation.clone()));

        // Let the listener install its handlers before raising.
        tokio::time::sleep(Duration::from_millis(50)).await;
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGUSR2).unwrap();

        tokio::time::timeout(Duration::from_secs(5), cancellation.cancelled())
            .await
            .unwrap();
        listener.await.unwrap();
    }
}
