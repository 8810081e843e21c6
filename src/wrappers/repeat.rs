//! # WithRepeat: run a task periodically.
//!
//! ```text
//! run ──Ok──► last = now ──► wait(until_next(last, now)) ──► run ──Ok──► ...
//!  └─Err──► return Err           └─ scope cancelled ──► return Ok
//! ```
//!
//! ## Rules
//! - The task runs once immediately, before the first wait.
//! - An error ends the loop and is returned as is; nothing is retried.
//! - Cancellation during a wait is a normal exit (`Ok`).
//! - Overdue firings (negative delay) run immediately; missed ticks are not replayed.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{ClockRef, SystemClock};
use crate::scope::Scope;
use crate::schedule::Interval;
use crate::tasks::{BoxTaskFuture, IntoTask, Task, TaskRef};

/// Periodic execution loop.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use runlet::{Every, Scope, Task, WithRepeat};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ticker = WithRepeat::new(Every(Duration::from_secs(60)), || async {
///     println!("tick");
/// });
///
/// let scope = Scope::new();
/// let handle = tokio::spawn(ticker.run(scope.clone()));
/// scope.cancel();
/// assert!(handle.await.unwrap().is_ok());
/// # }
/// ```
#[derive(Clone)]
pub struct WithRepeat {
    interval: Arc<dyn Interval>,
    task: TaskRef,
    clock: ClockRef,
}

impl WithRepeat {
    /// Repeats `task` on `interval`, timed by the system clock.
    pub fn new<M>(interval: impl Interval, task: impl IntoTask<M>) -> Self {
        Self {
            interval: Arc::new(interval),
            task: task.into_task(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = clock;
        self
    }
}

impl Task for WithRepeat {
    fn name(&self) -> &str {
        self.task.name()
    }

    fn spawn(&self, scope: Scope) -> BoxTaskFuture {
        let this = self.clone();
        Box::pin(async move {
            this.task.spawn(scope.clone()).await?;
            let mut last = this.clock.now();

            loop {
                let delay = this
                    .interval
                    .until_next(last, this.clock.now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);

                tokio::select! {
                    biased;
                    _ = scope.cancelled() => return Ok(()),
                    _ = this.clock.after(delay) => {}
                }

                this.task.spawn(scope.clone()).await?;
                last = this.clock.now();
            }
        })
    }
}

/// Builds a periodic task timed by the system clock.
pub fn with_repeat<M>(interval: impl Interval, task: impl IntoTask<M>) -> TaskRef {
    Arc::new(WithRepeat::new(interval, task))
}
