//! # Scheduling.
//!
//! - [`Interval`] strategies ([`Every`], [`Daily`], [`Monthly`]) compute the next firing time.
//! - [`ScheduleState`] / [`ScheduleStore`] persist when each job last ran.
//! - [`LockFactory`] / [`Locker`] serialize ticks of one job across processes.
//! - [`Scheduler`] combines them into at-most-once execution per interval tick.

mod interval;
mod lock;
mod scheduler;
mod state;

pub use interval::{Daily, Every, Interval, Monthly};
pub use lock::{LockFactory, Locker, LockerRef, MemoryLockFactory};
pub use scheduler::Scheduler;
pub use state::{MemoryScheduleStore, ScheduleState, ScheduleStore};
