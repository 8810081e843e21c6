//! # Task abstraction.
//!
//! This module defines the [`Task`] trait (async, cancelable) and the shared handle [`TaskRef`].
//!
//! A task receives a [`Scope`] and should observe it to stop cooperatively
//! once the scope is cancelled.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TaskError;
use crate::scope::Scope;

/// Boxed future returned by [`Task::spawn`].
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

/// # Shared handle to a task object.
///
/// This is the canonical task value: every combinator and wrapper takes and returns one.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable unit.
///
/// A `Task` has a human-readable [`name`](Task::name) and produces a fresh future per
/// [`spawn`](Task::spawn). Tasks are stateless values: state lives in whatever the
/// implementation captures (use `Arc<...>` explicitly when it must be shared).
///
/// # Example
/// ```
/// use runlet::{BoxTaskFuture, Scope, Task, TaskError};
///
/// struct Demo;
///
/// impl Task for Demo {
///     fn name(&self) -> &str { "demo" }
///
///     fn spawn(&self, scope: Scope) -> BoxTaskFuture {
///         Box::pin(async move {
///             if scope.is_cancelled() {
///                 return Err(TaskError::Canceled);
///             }
///             // do work...
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Creates the future that executes the task until completion or cancellation.
    ///
    /// Implementations should observe `scope` and exit quickly once it is cancelled.
    fn spawn(&self, scope: Scope) -> BoxTaskFuture;

    /// Runs the task to completion on `scope`.
    fn run(&self, scope: Scope) -> BoxTaskFuture {
        self.spawn(scope)
    }
}
