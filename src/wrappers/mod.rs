//! Wrappers: functions taking one task and returning a modified task.
//!
//! - [`WithShutdown`] pairs a start-function with a stop-function run on shutdown.
//! - [`WithRepeat`] re-runs a task on an [`Interval`](crate::Interval).
//! - [`WithSignalNotify`] turns process signals into cancellation.
//! - [`OnError`] routes failures through a handler.

mod on_error;
mod repeat;
mod shutdown;
mod signal_notify;

pub use on_error::{OnError, on_error};
pub use repeat::{WithRepeat, with_repeat};
pub use shutdown::{WithShutdown, with_shutdown};
pub use signal_notify::{WithSignalNotify, with_signal_notify};
