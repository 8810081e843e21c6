//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the process entrypoint, and the single
//! process-wide knob of the crate: the **graceful-shutdown window**.
//!
//! The window bounds how long a [`WithShutdown`](crate::WithShutdown) stop-function may run
//! after the outer scope is cancelled. It is read at the moment shutdown begins, so tests can
//! shrink it with [`set_shutdown_grace`] (or override it per wrapper with
//! [`WithShutdown::grace`](crate::WithShutdown::grace)).
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use runlet::{Config, Signal};
//!
//! let mut cfg = Config::default();
//! cfg.shutdown_grace = Duration::from_secs(3);
//! cfg.signals = vec![Signal::Interrupt, Signal::Terminate];
//! cfg.install();
//!
//! assert_eq!(runlet::shutdown_grace(), Duration::from_secs(3));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::signals::Signal;

/// Default graceful-shutdown window.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

static SHUTDOWN_GRACE_NANOS: AtomicU64 = AtomicU64::new(DEFAULT_SHUTDOWN_GRACE.as_nanos() as u64);

/// Returns the current process-wide graceful-shutdown window.
pub fn shutdown_grace() -> Duration {
    Duration::from_nanos(SHUTDOWN_GRACE_NANOS.load(Ordering::Relaxed))
}

/// Replaces the process-wide graceful-shutdown window.
///
/// Durations beyond `u64::MAX` nanoseconds (~584 years) saturate.
pub fn set_shutdown_grace(grace: Duration) {
    let nanos = u64::try_from(grace.as_nanos()).unwrap_or(u64::MAX);
    SHUTDOWN_GRACE_NANOS.store(nanos, Ordering::Relaxed);
}

/// Process entrypoint configuration.
///
/// ## Field semantics
/// - `shutdown_grace`: time given to stop-functions once shutdown begins
/// - `signals`: OS signals that cancel the root scope in [`run_main`](crate::run_main)
#[derive(Clone, Debug)]
pub struct Config {
    /// Graceful-shutdown window published by [`Config::install`].
    pub shutdown_grace: Duration,

    /// Signals translated into cancellation of the entrypoint scope.
    pub signals: Vec<Signal>,
}

impl Config {
    /// Publishes `shutdown_grace` as the process-wide window.
    pub fn install(&self) {
        set_shutdown_grace(self.shutdown_grace);
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `shutdown_grace = 10s`
    /// - `signals = [Interrupt, Hangup, Terminate]`
    fn default() -> Self {
        Self {
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            signals: Signal::DEFAULT.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.shutdown_grace, Duration::from_secs(10));
        assert_eq!(
            cfg.signals,
            vec![Signal::Interrupt, Signal::Hangup, Signal::Terminate]
        );
    }
}
