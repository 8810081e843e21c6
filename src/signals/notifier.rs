//! # Signal notifier contract.
//!
//! The core never touches OS signal handlers directly: it goes through a [`SignalNotifier`],
//! so tests can inject [`ManualSignals`](crate::ManualSignals) and fire signals on demand.
//!
//! ## Rules
//! - A subscription is identified by its channel (`UnboundedSender::same_channel`).
//! - After `unsubscribe`, no further signals are delivered to that channel.
//! - Subscribing the same channel twice is allowed; one `unsubscribe` removes both.

use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::signals::Signal;

/// Shared handle to a notifier.
pub type NotifierRef = Arc<dyn SignalNotifier>;

/// Delivers process signals into channels.
pub trait SignalNotifier: Send + Sync + 'static {
    /// Starts delivering any of `signals` into `tx`.
    fn subscribe(&self, tx: mpsc::UnboundedSender<Signal>, signals: &[Signal]) -> io::Result<()>;

    /// Stops delivering into `tx`.
    fn unsubscribe(&self, tx: &mpsc::UnboundedSender<Signal>);
}
