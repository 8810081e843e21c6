//! # Concurrence: run tasks in parallel, cancel peers on failure.
//!
//! ```text
//!                 ┌──► t1 ──┐
//! scope ─► child ─┼──► t2 ──┼──► join all ──► aggregate
//!                 └──► tN ──┘
//!
//! first non-cancellation Err ──► child.cancel() (peers observe it)
//! ```
//!
//! ## Rules
//! - Each task runs on its own Tokio task, sharing one **derived** scope.
//! - A peer returning `Canceled` is dropped and does not cancel peers.
//! - Errors that are the derived scope's own cancellation (see
//!   [`Scope::is_own_cancellation`]) are dropped. Anything else, including a
//!   `DeadlineExceeded` from a peer's private timeout, cancels peers.
//! - Returns only after **every** task has returned.
//! - Kept errors are merged into a [`MultiError`](crate::MultiError) (order unspecified).
//! - A panicking task counts as a failure.
//! - An empty set succeeds immediately.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{LockError, MultiError, TaskError};
use crate::scope::Scope;
use crate::tasks::{BoxTaskFuture, IntoTask, Task, TaskRef};

/// Set of tasks run concurrently.
///
/// # Example
/// ```
/// use runlet::{Concurrence, Scope, Task, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let both = Concurrence::new()
///     .with(|| async { Err::<(), _>(TaskError::fail("boom")) })
///     .with(|scope: Scope| async move { scope.cancelled().await });
///
/// match both.run(Scope::new()).await {
///     Err(TaskError::Multiple(m)) => assert_eq!(m.len(), 1),
///     other => panic!("unexpected: {other:?}"),
/// }
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Concurrence {
    tasks: Vec<TaskRef>,
}

impl Concurrence {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task.
    pub fn with<M>(mut self, task: impl IntoTask<M>) -> Self {
        self.tasks.push(task.into_task());
        self
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<TaskRef> for Concurrence {
    fn from_iter<I: IntoIterator<Item = TaskRef>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

impl Task for Concurrence {
    fn name(&self) -> &str {
        "concurrence"
    }

    fn spawn(&self, scope: Scope) -> BoxTaskFuture {
        let tasks = self.tasks.clone();
        Box::pin(run_all(tasks, scope))
    }
}

async fn run_all(tasks: Vec<TaskRef>, scope: Scope) -> Result<(), TaskError> {
    if tasks.is_empty() {
        return Ok(());
    }

    let child = scope.child();
    let mut set = JoinSet::new();
    for task in tasks {
        let s = child.clone();
        set.spawn(async move {
            let res = task.spawn(s).await;
            (task, res)
        });
    }

    let mut errors = Vec::new();
    while let Some(joined) = set.join_next().await {
        let (name, err) = match joined {
            Ok((_, Ok(()))) => continue,
            Ok((task, Err(e))) => (task.name().to_owned(), e),
            Err(join_err) => (
                "unknown".to_owned(),
                TaskError::fail(format!("task panicked: {join_err}")),
            ),
        };

        let cancellation = match &err {
            TaskError::Canceled | TaskError::Lock(LockError::Canceled) => true,
            other => child.is_own_cancellation(other),
        };
        if cancellation {
            debug!(task = %name, "peer returned cancellation");
            continue;
        }
        if !child.is_cancelled() {
            debug!(task = %name, error = %err, "peer failed; cancelling peers");
            child.cancel();
        }
        errors.push(err);
    }

    match MultiError::new(errors) {
        Some(multi) => Err(TaskError::Multiple(multi)),
        None => Ok(()),
    }
}

/// Builds a concurrence task from a list.
pub fn concurrence<I>(tasks: I) -> TaskRef
where
    I: IntoIterator<Item = TaskRef>,
{
    Arc::new(tasks.into_iter().collect::<Concurrence>())
}
