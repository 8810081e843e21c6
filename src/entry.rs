//! # Process entrypoint.
//!
//! ```text
//! run_main(scope, tasks) ≡ WithSignalNotify(Concurrence(tasks))(scope)
//! ```
//!
//! The canonical shape of a service `main`: every top-level task runs concurrently, the first
//! failure cancels the rest, and a shutdown signal turns into a clean `Ok` once the tasks have
//! wound down. Mapping the result to an exit code is the caller's concern.

use std::sync::Arc;

use crate::combinators::Concurrence;
use crate::config::Config;
use crate::error::TaskError;
use crate::scope::Scope;
use crate::signals::{NotifierRef, OsSignals, Signal};
use crate::tasks::{Task, TaskRef};
use crate::wrappers::WithSignalNotify;

/// Runs `tasks` concurrently until they finish or a default shutdown signal arrives.
///
/// Uses [`OsSignals`] with [`Signal::DEFAULT`] and leaves the process-wide graceful-shutdown
/// window as it is.
///
/// # Example
/// ```no_run
/// use runlet::{Scope, TaskError, to_task};
///
/// #[tokio::main]
/// async fn main() -> Result<(), TaskError> {
///     let worker = to_task(|scope: Scope| async move {
///         scope.cancelled().await;
///         Ok::<_, TaskError>(())
///     });
///     runlet::run_main(Scope::new(), [worker]).await
/// }
/// ```
pub async fn run_main<I>(scope: Scope, tasks: I) -> Result<(), TaskError>
where
    I: IntoIterator<Item = TaskRef>,
{
    run_with(scope, Arc::new(OsSignals::new()), Signal::DEFAULT.to_vec(), tasks).await
}

/// Like [`run_main`], with an explicit configuration and signal notifier.
///
/// Installs `cfg` (publishing its graceful-shutdown window) before starting.
pub async fn run_main_with<I>(
    scope: Scope,
    cfg: &Config,
    notifier: NotifierRef,
    tasks: I,
) -> Result<(), TaskError>
where
    I: IntoIterator<Item = TaskRef>,
{
    cfg.install();
    run_with(scope, notifier, cfg.signals.clone(), tasks).await
}

async fn run_with<I>(
    scope: Scope,
    notifier: NotifierRef,
    signals: Vec<Signal>,
    tasks: I,
) -> Result<(), TaskError>
where
    I: IntoIterator<Item = TaskRef>,
{
    let all: Concurrence = tasks.into_iter().collect();
    WithSignalNotify::new(Arc::new(all))
        .with_notifier(notifier)
        .with_signals(signals)
        .run(scope)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::ManualSignals;
    use crate::tasks::to_task;
    use crate::wrappers::WithShutdown;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_main_succeeds() {
        let signals: NotifierRef = Arc::new(ManualSignals::new());
        let res = run_main_with(Scope::new(), &Config::default(), signals, Vec::new()).await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn test_failure_is_returned_as_composite() {
        let signals: NotifierRef = Arc::new(ManualSignals::new());
        let tasks = [
            to_task(|| async { Err::<(), _>(TaskError::fail("boom")) }),
            to_task(|scope: Scope| async move { scope.cancelled().await }),
        ];

        let cfg = Config {
            shutdown_grace: Duration::from_secs(10),
            ..Config::default()
        };
        match run_main_with(Scope::new(), &cfg, signals, tasks).await {
            Err(TaskError::Multiple(m)) => assert_eq!(m.len(), 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_overrun_after_signal_is_an_error() {
        let signals = Arc::new(ManualSignals::new());
        let server = WithShutdown::new(
            |scope: Scope| async move { scope.cancelled().await },
            |scope: Scope| async move {
                scope.cancelled().await;
                Err::<(), _>(scope.err().unwrap_or(TaskError::Canceled))
            },
        )
        .grace(Duration::from_millis(20));

        let handle = tokio::spawn({
            let signals: NotifierRef = signals.clone();
            async move {
                let tasks = [Arc::new(server) as TaskRef];
                run_main_with(Scope::new(), &Config::default(), signals, tasks).await
            }
        });
        while signals.subscribers() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(signals.fire(Signal::Interrupt), 1);

        match tokio::time::timeout(Duration::from_secs(5), handle).await {
            Ok(Ok(Err(TaskError::Multiple(m)))) => {
                assert!(m.contains(|e| matches!(e, TaskError::DeadlineExceeded)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
