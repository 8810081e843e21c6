//! # Task abstractions.
//!
//! This module provides the core task-related types:
//! - [`Task`] - trait for implementing async cancelable tasks
//! - [`TaskFn`] - function-backed task implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`IntoTask`] / [`to_task`] - adapters from the supported callable shapes

mod into_task;
mod task;
mod task_fn;

pub use into_task::{IntoTask, shape, to_task};
pub use task::{BoxTaskFuture, Task, TaskRef};
pub use task_fn::TaskFn;
