//! Signal identifiers understood by the notifiers.

use std::fmt;

/// Process signal.
///
/// Platform mapping is the notifier's concern; see [`OsSignals`](crate::OsSignals).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `SIGINT` (Ctrl-C in terminal).
    Interrupt,
    /// `SIGHUP` (controlling terminal closed, or reload request).
    Hangup,
    /// `SIGTERM` (default kill signal, used by systemd/Kubernetes).
    Terminate,
    /// `SIGQUIT` (quit signal, often used for core dumps or hard stop).
    Quit,
}

impl Signal {
    /// The conventional shutdown triad: interrupt, hangup, terminate.
    pub const DEFAULT: [Signal; 3] = [Signal::Interrupt, Signal::Hangup, Signal::Terminate];

    /// Conventional Unix name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Hangup => "SIGHUP",
            Signal::Terminate => "SIGTERM",
            Signal::Quit => "SIGQUIT",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
