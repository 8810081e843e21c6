//! # runlet
//!
//! **Runlet** is a small task-orchestration core for Rust services.
//!
//! Everything is a [`Task`]: a cancellable unit of work taking a [`Scope`] and returning
//! `Result<(), TaskError>`. Combinators and wrappers take tasks and return tasks, so a whole
//! service is one composed value handed to [`run_main`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         run_main(scope, tasks)
//!                                  │
//!                    ┌─────────────▼─────────────┐
//!                    │     WithSignalNotify      │  SIGINT/SIGHUP/SIGTERM ─► cancel
//!                    └─────────────┬─────────────┘
//!                    ┌─────────────▼─────────────┐
//!                    │        Concurrence        │  first failure ─► cancel peers
//!                    └──┬──────────┬──────────┬──┘
//!                       ▼          ▼          ▼
//!              ┌─────────────┐ ┌──────────┐ ┌────────────────────────┐
//!              │WithShutdown │ │WithRepeat│ │Scheduler::with_schedule│
//!              │ start / stop│ │(Interval)│ │  lock ─► state ─► run  │
//!              └─────────────┘ └──────────┘ └───────────┬────────────┘
//!                                                      │
//!                                   LockFactory ◄──────┴──────► ScheduleStore
//! ```
//!
//! ### Scope
//! ```text
//! Scope::new() ──► child() ──► with_timeout(d) ──► detached()
//!   cancel() flows downward; detached() keeps values, drops cancellation
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                                   |
//! |-------------------|--------------------------------------------------------------|------------------------------------------------------|
//! | **Tasks**         | Canonical task value and adapters from closures.             | [`Task`], [`TaskRef`], [`TaskFn`], [`to_task`]       |
//! | **Combinators**   | Sequential and concurrent composition.                       | [`Sequence`], [`Concurrence`]                        |
//! | **Wrappers**      | Graceful shutdown, repetition, signals, error handlers.      | [`WithShutdown`], [`WithRepeat`], [`WithSignalNotify`], [`OnError`] |
//! | **Scheduling**    | At-most-once execution per interval across processes.        | [`Scheduler`], [`Interval`], [`Locker`], [`ScheduleStore`] |
//! | **Collaborators** | Injectable time and signals, with test doubles.              | [`Clock`], [`MockClock`], [`SignalNotifier`], [`ManualSignals`] |
//! | **Errors**        | Typed errors with stable labels.                             | [`TaskError`], [`MultiError`], [`LockError`], [`StoreError`] |
//! | **Configuration** | Entrypoint settings and the graceful-shutdown window.        | [`Config`], [`shutdown_grace`]                       |
//!
//! Logging goes through `tracing`; the crate never installs a subscriber.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use runlet::{
//!     Every, MemoryLockFactory, MemoryScheduleStore, Scheduler, Scope, TaskError, TaskRef,
//!     WithRepeat, WithShutdown,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), TaskError> {
//!     let server: TaskRef = Arc::new(WithShutdown::new(
//!         |scope: Scope| async move {
//!             scope.cancelled().await;
//!             Ok::<_, TaskError>(())
//!         },
//!         || async { println!("draining connections") },
//!     ));
//!
//!     let heartbeat: TaskRef = Arc::new(WithRepeat::new(Every(Duration::from_secs(30)), || async {
//!         println!("alive");
//!     }));
//!
//!     let scheduler = Scheduler::new(
//!         Arc::new(MemoryLockFactory::new()),
//!         Arc::new(MemoryScheduleStore::new()),
//!     );
//!     let report = scheduler.with_schedule("report", Every(Duration::from_secs(3600)), || async {
//!         println!("report sent");
//!     });
//!
//!     runlet::run_main(Scope::new(), [server, heartbeat, report]).await
//! }
//! ```
mod clock;
mod combinators;
mod config;
mod entry;
mod error;
mod schedule;
mod scope;
mod signals;
mod tasks;
mod wrappers;

// ---- Public re-exports ----

pub use clock::{Clock, ClockRef, MockClock, SystemClock};
pub use combinators::{Concurrence, Sequence, concurrence, sequence};
pub use config::{Config, DEFAULT_SHUTDOWN_GRACE, set_shutdown_grace, shutdown_grace};
pub use entry::{run_main, run_main_with};
pub use error::{IntervalError, LockError, MultiError, StoreError, TaskError};
pub use schedule::{
    Daily, Every, Interval, LockFactory, Locker, LockerRef, MemoryLockFactory,
    MemoryScheduleStore, Monthly, ScheduleState, ScheduleStore, Scheduler,
};
pub use scope::Scope;
pub use signals::{ManualSignals, NotifierRef, OsSignals, Signal, SignalNotifier};
pub use tasks::{BoxTaskFuture, IntoTask, Task, TaskFn, TaskRef, shape, to_task};
pub use wrappers::{
    OnError, WithRepeat, WithShutdown, WithSignalNotify, on_error, with_repeat, with_shutdown,
    with_signal_notify,
};
