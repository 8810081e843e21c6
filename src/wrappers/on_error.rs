//! # OnError: route task failures through a handler.
//!
//! Success and cancellation pass through untouched; any other error is handed to the handler,
//! whose result replaces the task's. Typical uses: logging in one place, or translating an
//! expected failure into success.

use std::sync::Arc;

use crate::error::TaskError;
use crate::scope::Scope;
use crate::tasks::{BoxTaskFuture, IntoTask, Task, TaskRef};

type Handler = Arc<dyn Fn(TaskError) -> Result<(), TaskError> + Send + Sync>;

/// Task with an error handler.
///
/// # Example
/// ```
/// use runlet::{OnError, Scope, Task, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let tolerant = OnError::new(
///     || async { Err::<(), _>(TaskError::fail("cache miss")) },
///     |err| {
///         eprintln!("ignored: {err}");
///         Ok(())
///     },
/// );
/// assert!(tolerant.run(Scope::new()).await.is_ok());
/// # }
/// ```
#[derive(Clone)]
pub struct OnError {
    task: TaskRef,
    handler: Handler,
}

impl OnError {
    /// Wraps `task` with `handler`.
    pub fn new<M, H>(task: impl IntoTask<M>, handler: H) -> Self
    where
        H: Fn(TaskError) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        Self {
            task: task.into_task(),
            handler: Arc::new(handler),
        }
    }
}

impl Task for OnError {
    fn name(&self) -> &str {
        self.task.name()
    }

    fn spawn(&self, scope: Scope) -> BoxTaskFuture {
        let fut = self.task.spawn(scope);
        let handler = self.handler.clone();
        Box::pin(async move {
            match fut.await {
                Err(e) if !e.is_cancellation() => handler(e),
                other => other,
            }
        })
    }
}

/// Wraps `task` with `handler`.
pub fn on_error<M, H>(task: impl IntoTask<M>, handler: H) -> TaskRef
where
    H: Fn(TaskError) -> Result<(), TaskError> + Send + Sync + 'static,
{
    Arc::new(OnError::new(task, handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_handler_result_replaces_failure() {
        let task = on_error(
            || async { Err::<(), _>(TaskError::fail("raw")) },
            |err| Err(TaskError::fail(format!("wrapped: {err}"))),
        );
        let res = task.run(Scope::new()).await;
        assert!(matches!(res, Err(TaskError::Fail { error }) if error == "wrapped: execution failed: raw"));
    }

    #[tokio::test]
    async fn test_success_and_cancellation_skip_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = {
            let calls = calls.clone();
            move |err: TaskError| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(err)
            }
        };

        let ok = OnError::new(|| async {}, handler.clone());
        assert!(ok.run(Scope::new()).await.is_ok());

        let cancelled = OnError::new(|| async { Err::<(), _>(TaskError::Canceled) }, handler);
        assert!(matches!(
            cancelled.run(Scope::new()).await,
            Err(TaskError::Canceled)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
