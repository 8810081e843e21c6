//! # In-memory signal notifier.
//!
//! [`ManualSignals`] never touches the OS: signals are delivered only when
//! [`ManualSignals::fire`] is called. Intended for deterministic tests.

use std::io;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::signals::{Signal, SignalNotifier};

/// Notifier driven by explicit [`fire`](ManualSignals::fire) calls.
///
/// # Example
/// ```
/// use runlet::{ManualSignals, Signal, SignalNotifier};
/// use tokio::sync::mpsc;
///
/// let signals = ManualSignals::new();
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// signals.subscribe(tx, &[Signal::Interrupt]).unwrap();
///
/// assert_eq!(signals.fire(Signal::Terminate), 0);
/// assert_eq!(signals.fire(Signal::Interrupt), 1);
/// assert_eq!(rx.try_recv().unwrap(), Signal::Interrupt);
/// ```
#[derive(Default)]
pub struct ManualSignals {
    subs: Mutex<Vec<(mpsc::UnboundedSender<Signal>, Vec<Signal>)>>,
}

impl ManualSignals {
    /// Creates a notifier with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `sig` to every subscriber listening for it; returns the delivery count.
    pub fn fire(&self, sig: Signal) -> usize {
        let subs = self.subs.lock().unwrap_or_else(PoisonError::into_inner);
        subs.iter()
            .filter(|(_, wanted)| wanted.contains(&sig))
            .filter(|(tx, _)| tx.send(sig).is_ok())
            .count()
    }

    /// Number of live subscriptions.
    pub fn subscribers(&self) -> usize {
        self.subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SignalNotifier for ManualSignals {
    fn subscribe(&self, tx: mpsc::UnboundedSender<Signal>, signals: &[Signal]) -> io::Result<()> {
        self.subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((tx, signals.to_vec()));
        Ok(())
    }

    fn unsubscribe(&self, tx: &mpsc::UnboundedSender<Signal>) {
        self.subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(s, _)| !s.same_channel(tx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let signals = ManualSignals::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        signals.subscribe(tx.clone(), &Signal::DEFAULT).unwrap();
        assert_eq!(signals.subscribers(), 1);

        signals.unsubscribe(&tx);
        assert_eq!(signals.subscribers(), 0);
        assert_eq!(signals.fire(Signal::Hangup), 0);
        assert!(rx.try_recv().is_err());
    }
}
