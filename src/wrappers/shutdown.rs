//! # WithShutdown: pair a long-running start-function with a stop-function.
//!
//! ```text
//! scope ──► spawn(start(scope)) ─┬─ start returns first ───────────► start's result
//!                                └─ scope cancelled ──► stop(detached + grace) ──► stop's result
//!                                                          │
//!                                      start is awaited until the grace window closes,
//!                                      then aborted
//! ```
//!
//! ## Rules
//! - `stop` is never invoked when `start` returns before the scope is cancelled.
//! - `stop` receives a **detached** scope: it keeps the outer values but is not cancelled,
//!   and its deadline is the graceful-shutdown window.
//! - The window is read when shutdown begins: [`WithShutdown::grace`] if set, otherwise
//!   the process-wide [`shutdown_grace`](crate::shutdown_grace).
//! - A panicking `start` is reported as [`TaskError::Fail`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{info, warn};

use crate::config::shutdown_grace;
use crate::error::TaskError;
use crate::scope::Scope;
use crate::tasks::{BoxTaskFuture, IntoTask, Task, TaskRef};

/// Start/stop pair run as one task.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use runlet::{Scope, Task, TaskError, WithShutdown};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let server = WithShutdown::new(
///     |scope: Scope| async move {
///         scope.cancelled().await;
///         Ok::<_, TaskError>(())
///     },
///     |_scope: Scope| async { Ok::<_, TaskError>(()) },
/// )
/// .grace(Duration::from_millis(50));
///
/// let scope = Scope::new();
/// scope.cancel();
/// assert!(server.run(scope).await.is_ok());
/// # }
/// ```
#[derive(Clone)]
pub struct WithShutdown {
    start: TaskRef,
    stop: TaskRef,
    grace: Option<Duration>,
}

impl WithShutdown {
    /// Pairs `start` with `stop`.
    pub fn new<M1, M2>(start: impl IntoTask<M1>, stop: impl IntoTask<M2>) -> Self {
        Self {
            start: start.into_task(),
            stop: stop.into_task(),
            grace: None,
        }
    }

    /// Overrides the graceful-shutdown window for this wrapper only.
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = Some(grace);
        self
    }
}

impl Task for WithShutdown {
    fn name(&self) -> &str {
        self.start.name()
    }

    fn spawn(&self, scope: Scope) -> BoxTaskFuture {
        let start = self.start.clone();
        let stop = self.stop.clone();
        let grace = self.grace;

        Box::pin(async move {
            let mut handle = tokio::spawn(start.spawn(scope.clone()));

            tokio::select! {
                biased;
                joined = &mut handle => return joined.unwrap_or_else(|e| Err(panicked(e))),
                _ = scope.cancelled() => {}
            }

            let grace = grace.unwrap_or_else(shutdown_grace);
            info!(task = start.name(), ?grace, "graceful shutdown started");

            let stop_scope = scope.detached().with_timeout(grace);
            let res = stop.spawn(stop_scope.clone()).await;
            if matches!(res, Err(TaskError::DeadlineExceeded)) {
                warn!(task = stop.name(), ?grace, "stop exceeded graceful shutdown window");
            }

            tokio::select! {
                biased;
                _ = &mut handle => {}
                _ = stop_scope.cancelled() => {
                    warn!(task = start.name(), "start still running after grace; aborting");
                    handle.abort();
                }
            }
            stop_scope.cancel();
            res
        })
    }
}

fn panicked(e: JoinError) -> TaskError {
    TaskError::fail(format!("task panicked: {e}"))
}

/// Builds a start/stop task using the process-wide graceful-shutdown window.
pub fn with_shutdown<M1, M2>(start: impl IntoTask<M1>, stop: impl IntoTask<M2>) -> TaskRef {
    Arc::new(WithShutdown::new(start, stop))
}
