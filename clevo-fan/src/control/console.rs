use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use super::{Command, StatusLine};
use crate::shared::ControlView;
use crate::tracing::prelude::*;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// The operator asked to quit.
    Quit,
    Cancelled,
}

/// Terminal status display and command prompt.
///
/// Prints a status line every second and reads one command per input line.
/// End of input stops command reading but keeps the display running, so the
/// console also works with stdin detached.
pub struct Console<'a> {
    view: ControlView<'a>,
    refresh: Duration,
}

impl<'a> Console<'a> {
    pub fn new(view: ControlView<'a>) -> Self {
        Self {
            view,
            refresh: REFRESH_INTERVAL,
        }
    }

    pub async fn run<R>(self, input: R, cancellation: CancellationToken) -> ConsoleExit
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut reading = true;
        let mut refresh = tokio::time::interval(self.refresh);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    return ConsoleExit::Cancelled;
                }
                _ = refresh.tick() => {
                    println!("{}", StatusLine(self.view.snapshot()));
                }
                line = lines.next_line(), if reading => match line {
                    Ok(Some(line)) => {
                        if self.handle_line(&line) == Some(Command::Quit) {
                            return ConsoleExit::Quit;
                        }
                    }
                    Ok(None) => {
                        debug!("Command input closed");
                        reading = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "Unable to read commands");
                        reading = false;
                    }
                },
            }
        }
    }

    fn handle_line(&self, line: &str) -> Option<Command> {
        if line.trim().is_empty() {
            return None;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                command.apply(&self.view);
                match command {
                    Command::Auto => println!("Fan duty set to auto"),
                    Command::Manual(duty) => println!("Fan duty set to {duty}"),
                    Command::Quit => {}
                }
                Some(command)
            }
            Err(e) => {
                eprintln!("{e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duty::Duty;
    use crate::shared::SharedRegion;

    #[tokio::test(start_paused = true)]
    async fn should_apply_commands_until_quit() {
        let region = SharedRegion::new().unwrap();
        let console = Console::new(region.control_view());

        let exit = console
            .run(&b"50\n101\n\nquit\n70\n"[..], CancellationToken::new())
            .await;

        assert_eq!(exit, ConsoleExit::Quit);
        let snapshot = region.control_view().snapshot();
        assert!(!snapshot.auto_mode);
        assert_eq!(snapshot.requested_manual_duty, Duty::new(50));
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_to_auto() {
        let region = SharedRegion::new().unwrap();
        let console = Console::new(region.control_view());

        console
            .run(&b"40\nauto\nq\n"[..], CancellationToken::new())
            .await;

        let snapshot = region.control_view().snapshot();
        assert!(snapshot.auto_mode);
        assert_eq!(snapshot.requested_manual_duty, None);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_running_after_input_closes() {
        let region = SharedRegion::new().unwrap();
        let console = Console::new(region.control_view());
        let cancellation = CancellationToken::new();

        let (exit, ()) = tokio::join!(console.run(&b""[..], cancellation.clone()), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            cancellation.cancel();
        });

        assert_eq!(exit, ConsoleExit::Cancelled);
    }
}
