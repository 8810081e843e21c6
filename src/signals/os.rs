//! # Cross-platform OS signal notifier.
//!
//! [`OsSignals`] forwards real process signals into subscriber channels.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGHUP` (terminal hangup)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal, often used for core dumps or hard stop)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`], reported as [`Signal::Interrupt`];
//!   other signals are accepted but never delivered.
//!
//! Each subscription creates independent listeners, torn down on `unsubscribe`.

use std::io;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::signals::{Signal, SignalNotifier};

struct Subscription {
    tx: mpsc::UnboundedSender<Signal>,
    stop: CancellationToken,
}

/// Notifier backed by `tokio::signal`.
///
/// Must be used from within a Tokio runtime.
#[derive(Default)]
pub struct OsSignals {
    subs: Mutex<Vec<Subscription>>,
}

impl OsSignals {
    /// Creates a notifier with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalNotifier for OsSignals {
    fn subscribe(&self, tx: mpsc::UnboundedSender<Signal>, signals: &[Signal]) -> io::Result<()> {
        let stop = CancellationToken::new();
        listen_all(signals, &stop, |sig| listen(sig, tx.clone(), stop.clone()))?;
        self.subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription { tx, stop });
        Ok(())
    }

    fn unsubscribe(&self, tx: &mpsc::UnboundedSender<Signal>) {
        self.subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| {
                if s.tx.same_channel(tx) {
                    s.stop.cancel();
                    false
                } else {
                    true
                }
            });
    }
}

/// Starts one listener per signal. On the first failure, the ones already started are stopped.
fn listen_all(
    signals: &[Signal],
    stop: &CancellationToken,
    mut listen: impl FnMut(Signal) -> io::Result<()>,
) -> io::Result<()> {
    for &sig in signals {
        if let Err(e) = listen(sig) {
            stop.cancel();
            return Err(e);
        }
    }
    Ok(())
}

/// Spawns a forwarder for one signal until `stop` fires or the receiver is gone.
#[cfg(unix)]
fn listen(
    sig: Signal,
    tx: mpsc::UnboundedSender<Signal>,
    stop: CancellationToken,
) -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let kind = match sig {
        Signal::Interrupt => SignalKind::interrupt(),
        Signal::Hangup => SignalKind::hangup(),
        Signal::Terminate => SignalKind::terminate(),
        Signal::Quit => SignalKind::quit(),
    };
    let mut stream = signal(kind)?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                got = stream.recv() => match got {
                    Some(()) if tx.send(sig).is_ok() => {}
                    _ => break,
                },
            }
        }
    });
    Ok(())
}

/// Spawns a forwarder for one signal until `stop` fires or the receiver is gone.
#[cfg(not(unix))]
fn listen(
    sig: Signal,
    tx: mpsc::UnboundedSender<Signal>,
    stop: CancellationToken,
) -> io::Result<()> {
    if sig != Signal::Interrupt {
        return Ok(());
    }

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                got = tokio::signal::ctrl_c() => match got {
                    Ok(()) if tx.send(sig).is_ok() => {}
                    _ => break,
                },
            }
        }
    });
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe_tracks_channels() {
        let os = OsSignals::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (other, _other_rx) = mpsc::unbounded_channel();

        os.subscribe(tx.clone(), &[Signal::Hangup]).unwrap();
        os.subscribe(other.clone(), &[Signal::Hangup]).unwrap();
        assert_eq!(os.subs.lock().unwrap().len(), 2);

        os.unsubscribe(&tx);
        let subs = os.subs.lock().unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].tx.same_channel(&other));
    }

    #[test]
    fn test_failed_listener_stops_started_ones() {
        let stop = CancellationToken::new();
        let mut started = Vec::new();
        let res = listen_all(&Signal::DEFAULT, &stop, |sig| {
            if sig == Signal::Hangup {
                return Err(io::Error::other("not permitted"));
            }
            started.push(sig);
            Ok(())
        });

        assert!(res.is_err());
        assert_eq!(started, [Signal::Interrupt]);
        assert!(stop.is_cancelled());
    }
}
