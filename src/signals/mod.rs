//! OS signal plumbing.
//!
//! ## Contents
//! - [`Signal`] the signals the crate understands
//! - [`SignalNotifier`] the injectable subscribe/unsubscribe contract
//! - [`OsSignals`] real process signals via `tokio::signal`
//! - [`ManualSignals`] in-memory notifier for tests

mod manual;
mod notifier;
mod os;
mod signal;

pub use manual::ManualSignals;
pub use notifier::{NotifierRef, SignalNotifier};
pub use os::OsSignals;
pub use signal::Signal;
