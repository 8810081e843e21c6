//! # Sequence: run tasks one after another.
//!
//! ```text
//! scope ──► t1 ──Ok──► t2 ──Ok──► ... ──Ok──► tN ──► Ok
//!            └─Err──► return Err (stop)
//! ```
//!
//! ## Rules
//! - Every task receives the **same** scope.
//! - Strict happens-before between adjacent tasks.
//! - The first task always runs, even on a cancelled scope (observing it is the task's job).
//! - Between tasks, a cancelled scope short-circuits with the scope's error.
//! - An empty sequence succeeds immediately.

use tracing::debug;

use crate::error::TaskError;
use crate::scope::Scope;
use crate::tasks::{BoxTaskFuture, IntoTask, Task, TaskRef};

/// Ordered list of tasks run sequentially.
///
/// # Example
/// ```
/// use runlet::{Scope, Sequence, Task, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let seq = Sequence::new()
///     .then(|| async { println!("migrate") })
///     .then(|_scope: Scope| async { Ok::<_, TaskError>(()) });
///
/// assert!(seq.run(Scope::new()).await.is_ok());
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Sequence {
    tasks: Vec<TaskRef>,
}

impl Sequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task.
    pub fn then<M>(mut self, task: impl IntoTask<M>) -> Self {
        self.tasks.push(task.into_task());
        self
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<TaskRef> for Sequence {
    fn from_iter<I: IntoIterator<Item = TaskRef>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

impl Task for Sequence {
    fn name(&self) -> &str {
        "sequence"
    }

    fn spawn(&self, scope: Scope) -> BoxTaskFuture {
        let tasks = self.tasks.clone();
        Box::pin(async move {
            for (i, task) in tasks.iter().enumerate() {
                if i > 0 {
                    if let Some(err) = scope.err() {
                        debug!(step = i, "sequence interrupted by cancellation");
                        return Err(err);
                    }
                }
                debug!(step = i, task = task.name(), "sequence step starting");
                task.spawn(scope.clone()).await?;
            }
            Ok::<_, TaskError>(())
        })
    }
}

/// Builds a sequence task from an ordered list.
pub fn sequence<I>(tasks: I) -> TaskRef
where
    I: IntoIterator<Item = TaskRef>,
{
    std::sync::Arc::new(tasks.into_iter().collect::<Sequence>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::to_task;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str, fail: bool) -> TaskRef {
        let log = log.clone();
        to_task(move |_scope: Scope| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(tag);
                if fail {
                    Err(TaskError::fail(tag))
                } else {
                    Ok(())
                }
            }
        })
    }

    #[tokio::test]
    async fn test_empty_sequence_succeeds() {
        assert!(sequence(Vec::new()).run(Scope::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seq = sequence([
            recorder(&log, "a", false),
            recorder(&log, "b", false),
            recorder(&log, "c", false),
        ]);

        assert!(seq.run(Scope::new()).await.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_stops_on_first_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seq = sequence([
            recorder(&log, "a", false),
            recorder(&log, "b", true),
            recorder(&log, "c", false),
        ]);

        let res = seq.run(Scope::new()).await;
        assert!(matches!(res, Err(TaskError::Fail { error }) if error == "b"));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_first_task_runs_on_cancelled_scope_then_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seq = sequence([recorder(&log, "a", false), recorder(&log, "b", false)]);

        let scope = Scope::new();
        scope.cancel();
        let res = seq.run(scope).await;
        assert!(matches!(res, Err(TaskError::Canceled)));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }
}
