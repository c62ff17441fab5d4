//! Logging setup.
//!
//! Everything in the crate logs through the `tracing` macros re-exported
//! from [`prelude`]. Each process calls [`init`] once: under systemd the
//! output goes to the journal, otherwise to stderr with local timestamps.

use std::env;

use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. Calling this twice in the
/// same process is harmless; the second call is ignored.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if env::var_os("JOURNAL_STREAM").is_some() {
        if let Ok(journald) = tracing_journald::layer() {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(journald)
                .try_init();
            return;
        }
    }

    let timer = LocalTime::new(format_description!(
        "[day]/[month] [hour]:[minute]:[second]"
    ));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
